use crate::db;
use crate::grouping::{self, GroupingError, LineOutcome, Student, Violation};
use crate::ipc::handlers::settings::default_group_count;
use crate::ipc::helpers::{db_err, get_required_str, require_class, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde::Serialize;
use serde_json::json;

const COLOR_NAMES: [&str; grouping::VIOLATION_COLOR_COUNT] = [
    "red", "yellow", "green", "blue", "purple", "pink", "indigo", "orange",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ViolationView<'a> {
    #[serde(flatten)]
    violation: &'a Violation,
    label: String,
    color_name: &'static str,
}

impl<'a> From<&'a Violation> for ViolationView<'a> {
    fn from(v: &'a Violation) -> Self {
        let label = char::from(b'A' + (v.color_index % COLOR_NAMES.len()) as u8).to_string();
        Self {
            violation: v,
            label,
            color_name: COLOR_NAMES[v.color_index % COLOR_NAMES.len()],
        }
    }
}

/// Inline `students` wins over `classId`.
fn resolve_roster(state: &AppState, params: &serde_json::Value) -> Result<Vec<Student>, HandlerErr> {
    if let Some(raw) = params.get("students").filter(|v| !v.is_null()) {
        return serde_json::from_value(raw.clone())
            .map_err(|e| HandlerErr::bad_params(format!("invalid students: {e}")));
    }
    if params.get("classId").is_some() {
        let conn = require_db(state)?;
        let class_id = get_required_str(params, "classId")?;
        require_class(conn, &class_id)?;
        return db::list_roster(conn, &class_id).map_err(db_err("db_query_failed"));
    }
    Err(HandlerErr::bad_params("missing classId or students"))
}

fn exclusion_text(params: &serde_json::Value) -> Result<&str, HandlerErr> {
    match params.get("exclusionText") {
        None => Ok(""),
        Some(v) if v.is_null() => Ok(""),
        Some(v) => v
            .as_str()
            .ok_or_else(|| HandlerErr::bad_params("exclusionText must be a string")),
    }
}

fn requested_group_count(
    state: &AppState,
    params: &serde_json::Value,
    roster: &[Student],
) -> Result<usize, HandlerErr> {
    let raw = match params.get("numGroups") {
        None => return Ok(default_group_count(state).0),
        Some(v) if v.is_null() => return Ok(default_group_count(state).0),
        Some(v) => v
            .as_i64()
            .ok_or_else(|| HandlerErr::bad_params("numGroups must be an integer"))?,
    };
    usize::try_from(raw).map_err(|_| {
        if roster.is_empty() {
            GroupingError::EmptyRoster.into()
        } else {
            GroupingError::InvalidGroupCount {
                requested: raw,
                max: roster.len(),
            }
            .into()
        }
    })
}

fn groups_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let roster = resolve_roster(state, params)?;
    let text = exclusion_text(params)?;
    let num_groups = requested_group_count(state, params, &roster)?;

    let grouping = grouping::create_groups(&roster, num_groups, text)?;
    tracing::info!(
        students = roster.len(),
        groups = num_groups,
        rules = grouping.constraints.len(),
        violations = grouping.violations.len(),
        "groups created"
    );

    let violations: Vec<ViolationView<'_>> = grouping.violations.iter().map(ViolationView::from).collect();
    Ok(json!({
        "numGroups": num_groups,
        "groups": grouping.groups,
        "violations": violations,
        "constraintCount": grouping.constraints.len(),
    }))
}

fn groups_parse_exclusions(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let roster = resolve_roster(state, params)?;
    let text = exclusion_text(params)?;
    let name_of = |id: &str| {
        roster
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    };

    let mut kept = 0usize;
    let lines: Vec<serde_json::Value> = grouping::parse_exclusions_detailed(text, &roster)
        .into_iter()
        .map(|line| {
            let mut row = json!({
                "lineNumber": line.line_number,
                "text": line.text,
                "unmatched": line.unmatched,
            });
            match &line.outcome {
                LineOutcome::Kept(c) => {
                    kept += 1;
                    row["status"] = json!("kept");
                    row["constraintIndex"] = json!(c.index);
                    row["studentIds"] = json!(c.student_ids);
                    row["studentNames"] =
                        json!(c.student_ids.iter().map(|id| name_of(id.as_str())).collect::<Vec<_>>());
                }
                LineOutcome::TooFewNames => row["status"] = json!("too_few_names"),
                LineOutcome::TooFewMatches => row["status"] = json!("too_few_matches"),
            }
            row
        })
        .collect();

    Ok(json!({ "lines": lines, "constraintCount": kept }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "groups.create" => groups_create(state, &req.params),
        "groups.parseExclusions" => groups_parse_exclusions(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
