use crate::ipc::helpers::{db_err, get_required_str, require_class, require_db, respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn delete_failed(table: &'static str) -> impl FnOnce(rusqlite::Error) -> HandlerErr {
    move |e| HandlerErr::new("db_delete_failed", e.to_string()).with_details(json!({ "table": table }))
}

fn classes_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "classes": [] }));
    };

    // Correlated subqueries keep the leader count independent of the join.
    let mut stmt = conn
        .prepare(
            "SELECT
               c.id,
               c.name,
               (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count,
               (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id AND s.is_leader != 0)
                 AS leader_count
             FROM classes c
             ORDER BY c.name",
        )
        .map_err(db_err("db_query_failed"))?;

    let classes = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let student_count: i64 = row.get(2)?;
            let leader_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "studentCount": student_count,
                "leaderCount": leader_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_err("db_query_failed"))?;

    Ok(json!({ "classes": classes }))
}

fn classes_create(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }

    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, name) VALUES(?, ?)",
        (&class_id, &name),
    )
    .map_err(|e| {
        HandlerErr::new("db_insert_failed", e.to_string()).with_details(json!({ "table": "classes" }))
    })?;

    Ok(json!({ "classId": class_id, "name": name }))
}

fn classes_delete(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state)?;
    let class_id = get_required_str(params, "classId")?;
    require_class(conn, &class_id)?;

    let tx = conn.unchecked_transaction().map_err(db_err("db_tx_failed"))?;
    // No ON DELETE CASCADE; dependents go first.
    let attendance_rows = tx
        .execute("DELETE FROM attendance WHERE class_id = ?", [&class_id])
        .map_err(delete_failed("attendance"))?;
    tx.execute("DELETE FROM students WHERE class_id = ?", [&class_id])
        .map_err(delete_failed("students"))?;
    tx.execute("DELETE FROM classes WHERE id = ?", [&class_id])
        .map_err(delete_failed("classes"))?;
    tx.commit().map_err(db_err("db_commit_failed"))?;
    tracing::info!(class = %class_id, attendance_rows, "class deleted");

    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "classes.list" => classes_list(state),
        "classes.create" => classes_create(state, &req.params),
        "classes.delete" => classes_delete(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
