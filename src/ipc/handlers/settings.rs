use crate::db;
use crate::ipc::helpers::{db_err, get_required_i64, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

pub const DEFAULT_GROUP_COUNT_KEY: &str = "groups.default_count";

/// Workspace setting if present and sane, else the process default.
pub fn default_group_count(state: &AppState) -> (usize, &'static str) {
    let stored = match state.db.as_ref() {
        None => None,
        Some(conn) => match db::settings_get_json(conn, DEFAULT_GROUP_COUNT_KEY) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = DEFAULT_GROUP_COUNT_KEY, error = %e, "unreadable setting, using config");
                None
            }
        },
    };
    let usable = stored.as_ref().and_then(|v| v.as_u64()).filter(|n| *n >= 1);
    if let (Some(v), None) = (&stored, usable) {
        tracing::warn!(key = DEFAULT_GROUP_COUNT_KEY, value = %v, "unusable setting, using config");
    }
    match usable.and_then(|n| usize::try_from(n).ok()) {
        Some(n) => (n, "workspace"),
        None => (state.config.group_count(), "config"),
    }
}

fn settings_get(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let (count, source) = default_group_count(state);
    Ok(json!({ "defaultGroupCount": count, "source": source }))
}

fn settings_update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let count = get_required_i64(params, "defaultGroupCount")?;
    if count < 1 {
        return Err(HandlerErr::bad_params("defaultGroupCount must be at least 1"));
    }
    db::settings_set_json(conn, DEFAULT_GROUP_COUNT_KEY, &json!(count))
        .map_err(db_err("db_update_failed"))?;
    settings_get(state)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => settings_get(state),
        "settings.update" => settings_update(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
