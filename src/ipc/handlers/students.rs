use crate::db;
use crate::ipc::helpers::{
    db_err, get_required_bool, get_required_str, parse_score, require_class, require_db, respond,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn parse_number(v: &serde_json::Value) -> Result<i64, HandlerErr> {
    match v.as_i64() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(HandlerErr::bad_params("number must be a positive integer")),
    }
}

fn parse_name(v: &serde_json::Value) -> Result<String, HandlerErr> {
    let name = v
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| HandlerErr::bad_params("name must be a string"))?;
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    Ok(name)
}

fn require_student(conn: &Connection, class_id: &str, student_id: &str) -> Result<(), HandlerErr> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students WHERE id = ? AND class_id = ?",
            (student_id, class_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err("db_query_failed"))?;
    match found {
        Some(_) => Ok(()),
        None => Err(HandlerErr::new("not_found", "student not found")),
    }
}

fn students_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let roster = db::list_roster(conn, &class_id).map_err(db_err("db_query_failed"))?;
    Ok(json!({ "students": roster }))
}

fn students_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;

    let Some(number) = params.get("number") else {
        return Err(HandlerErr::bad_params("missing number"));
    };
    let number = parse_number(number)?;
    let Some(name) = params.get("name") else {
        return Err(HandlerErr::bad_params("missing name"));
    };
    let name = parse_name(name)?;
    let score = match params.get("score") {
        Some(v) => parse_score(v)?,
        None => None,
    };
    let is_leader = match params.get("isLeader") {
        Some(_) => get_required_bool(params, "isLeader")?,
        None => false,
    };

    let student_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, class_id, number, name, score, is_leader, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &class_id,
            number,
            &name,
            score,
            is_leader as i64,
            now_stamp(),
        ),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "students" }))
    })?;

    Ok(json!({ "studentId": student_id }))
}

fn students_update(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing patch"));
    };
    require_student(conn, &class_id, &student_id)?;

    let (mut number, mut name, mut score): (i64, String, Option<f64>) = conn
        .query_row(
            "SELECT number, name, score FROM students WHERE id = ?",
            [&student_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .map_err(db_err("db_query_failed"))?;

    if let Some(v) = patch.get("number") {
        number = parse_number(v)?;
    }
    if let Some(v) = patch.get("name") {
        name = parse_name(v)?;
    }
    if let Some(v) = patch.get("score") {
        score = parse_score(v)?;
    }

    conn.execute(
        "UPDATE students SET number = ?, name = ?, score = ?, updated_at = ? WHERE id = ?",
        (number, &name, score, now_stamp(), &student_id),
    )
    .map_err(db_err("db_update_failed"))?;

    Ok(json!({ "ok": true }))
}

fn students_set_leader(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let is_leader = get_required_bool(params, "isLeader")?;
    require_student(conn, &class_id, &student_id)?;

    conn.execute(
        "UPDATE students SET is_leader = ?, updated_at = ? WHERE id = ?",
        (is_leader as i64, now_stamp(), &student_id),
    )
    .map_err(db_err("db_update_failed"))?;
    tracing::debug!(student = %student_id, is_leader, "leader flag updated");

    Ok(json!({ "studentId": student_id, "isLeader": is_leader }))
}

fn students_delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    require_student(conn, &class_id, &student_id)?;

    let tx = conn.unchecked_transaction().map_err(db_err("db_tx_failed"))?;
    tx.execute("DELETE FROM attendance WHERE student_id = ?", [&student_id])
        .map_err(|e| {
            HandlerErr::new("db_delete_failed", e.to_string())
                .with_details(json!({ "table": "attendance" }))
        })?;
    tx.execute("DELETE FROM students WHERE id = ?", [&student_id])
        .map_err(|e| {
            HandlerErr::new("db_delete_failed", e.to_string())
                .with_details(json!({ "table": "students" }))
        })?;
    tx.commit().map_err(db_err("db_commit_failed"))?;
    Ok(json!({ "ok": true }))
}

/// Entries are validated up front; nothing is written unless all pass.
fn students_bulk_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let Some(entries) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("students must be an array"));
    };
    if entries.is_empty() {
        return Err(HandlerErr::bad_params("students must not be empty"));
    }

    let mut rows: Vec<(i64, String, Option<f64>, bool)> = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let at = |e: HandlerErr| e.with_details(json!({ "index": i }));
        let number = parse_number(entry.get("number").unwrap_or(&serde_json::Value::Null)).map_err(at)?;
        let name = parse_name(entry.get("name").unwrap_or(&serde_json::Value::Null)).map_err(at)?;
        let score = match entry.get("score") {
            Some(v) => parse_score(v).map_err(at)?,
            None => None,
        };
        let is_leader = match entry.get("isLeader") {
            Some(_) => get_required_bool(entry, "isLeader").map_err(at)?,
            None => false,
        };
        rows.push((number, name, score, is_leader));
    }

    let stamp = now_stamp();
    let tx = conn.unchecked_transaction().map_err(db_err("db_tx_failed"))?;
    let mut ids = Vec::with_capacity(rows.len());
    {
        let mut insert = tx
            .prepare(
                "INSERT INTO students(id, class_id, number, name, score, is_leader, updated_at)
                 VALUES(?, ?, ?, ?, ?, ?, ?)",
            )
            .map_err(db_err("db_insert_failed"))?;
        for (number, name, score, is_leader) in &rows {
            let student_id = Uuid::new_v4().to_string();
            insert
                .execute((
                    &student_id,
                    &class_id,
                    number,
                    name,
                    score,
                    *is_leader as i64,
                    &stamp,
                ))
                .map_err(|e| {
                    HandlerErr::new("db_insert_failed", e.to_string())
                        .with_details(json!({ "table": "students" }))
                })?;
            ids.push(student_id);
        }
    }
    tx.commit().map_err(db_err("db_commit_failed"))?;
    tracing::info!(class = %class_id, created = ids.len(), "students imported");

    Ok(json!({ "created": ids.len(), "studentIds": ids }))
}

/// Match rows to students on number and name together; unmatched rows are
/// reported back. Fails with `no_match` when nothing matches.
fn students_update_scores(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;
    let Some(entries) = params.get("scores").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("scores must be an array"));
    };

    let roster = db::list_roster(conn, &class_id).map_err(db_err("db_query_failed"))?;
    let by_key: HashMap<(i64, &str), &str> = roster
        .iter()
        .rev()
        .map(|s| ((s.number, s.name.as_str()), s.id.as_str()))
        .collect();

    let mut updates: Vec<(&str, Option<f64>)> = Vec::new();
    let mut unmatched = Vec::new();
    for (i, entry) in entries.iter().enumerate() {
        let at = |e: HandlerErr| e.with_details(json!({ "index": i }));
        let number = parse_number(entry.get("number").unwrap_or(&serde_json::Value::Null)).map_err(at)?;
        let name = parse_name(entry.get("name").unwrap_or(&serde_json::Value::Null)).map_err(at)?;
        let score = parse_score(entry.get("score").unwrap_or(&serde_json::Value::Null)).map_err(at)?;
        match by_key.get(&(number, name.as_str())) {
            Some(&id) => updates.push((id, score)),
            None => unmatched.push(json!({ "number": number, "name": name })),
        }
    }
    if updates.is_empty() {
        return Err(HandlerErr::new("no_match", "no student matched by number and name")
            .with_details(json!({ "unmatched": unmatched })));
    }

    let stamp = now_stamp();
    let tx = conn.unchecked_transaction().map_err(db_err("db_tx_failed"))?;
    for (id, score) in &updates {
        tx.execute(
            "UPDATE students SET score = ?, updated_at = ? WHERE id = ?",
            (score, &stamp, id),
        )
        .map_err(db_err("db_update_failed"))?;
    }
    tx.commit().map_err(db_err("db_commit_failed"))?;

    Ok(json!({ "updated": updates.len(), "unmatched": unmatched }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => students_list(state, &req.params),
        "students.create" => students_create(state, &req.params),
        "students.update" => students_update(state, &req.params),
        "students.setLeader" => students_set_leader(state, &req.params),
        "students.delete" => students_delete(state, &req.params),
        "students.bulkCreate" => students_bulk_create(state, &req.params),
        "students.updateScores" => students_update_scores(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
