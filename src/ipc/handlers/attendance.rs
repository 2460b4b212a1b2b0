use crate::attendance::{self, AttendanceRecord, MonthKey, RecordInput};
use crate::db;
use crate::ipc::helpers::{db_err, get_required_str, require_class, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::collections::{HashMap, HashSet};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RosterEntry<'a> {
    number: i64,
    name: &'a str,
    #[serde(flatten)]
    record: AttendanceRecord,
    /// False when nothing was saved and the entry defaults to present.
    recorded: bool,
}

fn iso(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

fn open_class<'a>(state: &'a AppState, params: &serde_json::Value) -> Result<(&'a Connection, String), HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    Ok((conn, class_id))
}

fn date_param(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    Ok(attendance::parse_date(&get_required_str(params, "date")?)?)
}

fn month_param(params: &serde_json::Value) -> Result<MonthKey, HandlerErr> {
    Ok(MonthKey::parse(&get_required_str(params, "month")?)?)
}

fn attendance_get(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = date_param(params)?;
    let (conn, class_id) = open_class(state, params)?;
    let roster = db::list_roster(conn, &class_id).map_err(db_err("db_query_failed"))?;
    let saved = db::list_attendance(conn, &class_id, date, date).map_err(db_err("db_query_failed"))?;
    let has_saved = !saved.is_empty();
    let mut by_student: HashMap<String, AttendanceRecord> = saved
        .into_iter()
        .map(|s| (s.record.student_id.clone(), s.record))
        .collect();

    let records: Vec<RosterEntry<'_>> = roster
        .iter()
        .map(|s| {
            let found = by_student.remove(&s.id);
            RosterEntry {
                number: s.number,
                name: &s.name,
                recorded: found.is_some(),
                record: found.unwrap_or_else(|| AttendanceRecord::present(&s.id)),
            }
        })
        .collect();

    Ok(json!({ "date": iso(date), "saved": has_saved, "records": records }))
}

fn attendance_save(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = date_param(params)?;
    let (conn, class_id) = open_class(state, params)?;
    let Some(raw) = params.get("records").filter(|v| v.is_array()) else {
        return Err(HandlerErr::bad_params("records must be an array"));
    };
    let inputs: Vec<RecordInput> = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid records: {e}")))?;
    let records = attendance::normalize_day(inputs)?;

    let roster = db::list_roster(conn, &class_id).map_err(db_err("db_query_failed"))?;
    let on_roster: HashSet<&str> = roster.iter().map(|s| s.id.as_str()).collect();
    if let Some(stray) = records
        .iter()
        .find(|r| !on_roster.contains(r.student_id.as_str()))
    {
        return Err(HandlerErr::new("not_found", "student not found in class")
            .with_details(json!({ "studentId": stray.student_id })));
    }

    let replaced = db::replace_attendance_day(
        conn,
        &class_id,
        date,
        &records,
        &chrono::Utc::now().to_rfc3339(),
    )
    .map_err(db_err("db_update_failed"))?;
    let abnormal = records.iter().filter(|r| r.status.is_abnormal()).count();
    tracing::info!(
        class = %class_id,
        date = %date,
        records = records.len(),
        abnormal,
        replaced,
        "attendance saved"
    );

    Ok(json!({
        "date": iso(date),
        "saved": records.len(),
        "abnormalCount": abnormal,
        "replaced": replaced,
    }))
}

fn attendance_dates(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let month = month_param(params)?;
    let (conn, class_id) = open_class(state, params)?;
    let dates = db::attendance_dates(conn, &class_id, month.first_day(), month.last_day())
        .map_err(db_err("db_query_failed"))?;
    Ok(json!({ "month": month.label(), "dates": dates }))
}

fn attendance_month(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let month = month_param(params)?;
    let (conn, class_id) = open_class(state, params)?;
    let roster = db::list_roster(conn, &class_id).map_err(db_err("db_query_failed"))?;
    let records = db::list_attendance(conn, &class_id, month.first_day(), month.last_day())
        .map_err(db_err("db_query_failed"))?;
    let days = attendance::month_summary(month, &records, &roster);
    Ok(json!({ "month": month.label(), "days": days }))
}

fn attendance_student(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let month = month_param(params)?;
    let (conn, class_id) = open_class(state, params)?;
    let roster = db::list_roster(conn, &class_id).map_err(db_err("db_query_failed"))?;
    let records = db::list_attendance(conn, &class_id, month.first_day(), month.last_day())
        .map_err(db_err("db_query_failed"))?;
    let students = attendance::student_summary(&records, &roster);
    Ok(json!({ "month": month.label(), "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.get" => attendance_get(state, &req.params),
        "attendance.save" => attendance_save(state, &req.params),
        "attendance.dates" => attendance_dates(state, &req.params),
        "attendance.month" => attendance_month(state, &req.params),
        "attendance.student" => attendance_student(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
