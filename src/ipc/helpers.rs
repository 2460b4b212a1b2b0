use crate::attendance::AttendanceError;
use crate::db;
use crate::grouping::GroupingError;
use crate::ipc::error::{err, ok};
use crate::ipc::types::AppState;
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<GroupingError> for HandlerErr {
    fn from(e: GroupingError) -> Self {
        let details = match &e {
            GroupingError::EmptyRoster => None,
            GroupingError::InvalidGroupCount { requested, max } => Some(json!({
                "min": 1,
                "max": max,
                "requested": requested,
            })),
            GroupingError::InvalidStudent { id, .. } | GroupingError::UnknownStudent { id } => {
                Some(json!({ "studentId": id }))
            }
        };
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

impl From<AttendanceError> for HandlerErr {
    fn from(e: AttendanceError) -> Self {
        let details = e.student_id().map(|id| json!({ "studentId": id }));
        Self {
            code: e.code(),
            message: e.to_string(),
            details,
        }
    }
}

/// Map a storage error into a handler error with the given code.
pub fn db_err<E: std::fmt::Display>(code: &'static str) -> impl FnOnce(E) -> HandlerErr {
    move |e| HandlerErr::new(code, e.to_string())
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => {
            tracing::debug!(id, code = e.code, message = %e.message, "request failed");
            e.response(id)
        }
    }
}

pub fn require_db(state: &AppState) -> Result<&Connection, HandlerErr> {
    state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
}

pub fn require_class(conn: &Connection, class_id: &str) -> Result<(), HandlerErr> {
    if db::class_exists(conn, class_id).map_err(db_err("db_query_failed"))? {
        Ok(())
    } else {
        Err(HandlerErr::new("not_found", "class not found"))
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_required_i64(params: &serde_json::Value, key: &str) -> Result<i64, HandlerErr> {
    match params.get(key) {
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be an integer", key))),
    }
}

pub fn get_required_bool(params: &serde_json::Value, key: &str) -> Result<bool, HandlerErr> {
    match params.get(key) {
        None => Err(HandlerErr::bad_params(format!("missing {}", key))),
        Some(v) => v
            .as_bool()
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a boolean", key))),
    }
}

/// `null` clears a score; anything else must be a finite number >= 0.
pub fn parse_score(v: &serde_json::Value) -> Result<Option<f64>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    match v.as_f64() {
        Some(x) if x.is_finite() && x >= 0.0 => Ok(Some(x)),
        _ => Err(HandlerErr::bad_params(
            "score must be a non-negative number or null",
        )),
    }
}
