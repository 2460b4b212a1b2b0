use crate::attendance::{AttendanceRecord, Reason, Status, StoredRecord};
use crate::grouping::Student;
use anyhow::Context;
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "groupd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            number INTEGER NOT NULL,
            name TEXT NOT NULL,
            score REAL,
            is_leader INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class ON students(class_id)",
        [],
    )?;

    // Existing workspaces may predate the leader flag.
    ensure_students_is_leader(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_number ON students(class_id, number)",
        [],
    )?;

    // One row per student per date; a save replaces the class's whole date.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            class_id TEXT NOT NULL,
            date TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            reason TEXT,
            periods_json TEXT NOT NULL DEFAULT '[]',
            memo TEXT NOT NULL DEFAULT '',
            updated_at TEXT,
            PRIMARY KEY(class_id, date, student_id),
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_students_is_leader(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "students", "is_leader")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE students ADD COLUMN is_leader INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub fn class_exists(conn: &Connection, class_id: &str) -> anyhow::Result<bool> {
    let found = conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Class roster ordered by student number (insertion order breaks ties).
pub fn list_roster(conn: &Connection, class_id: &str) -> anyhow::Result<Vec<Student>> {
    let mut stmt = conn.prepare(
        "SELECT id, number, name, score, is_leader
         FROM students
         WHERE class_id = ?
         ORDER BY number, rowid",
    )?;
    let students = stmt
        .query_map([class_id], |r| {
            Ok(Student {
                id: r.get(0)?,
                number: r.get(1)?,
                name: r.get(2)?,
                score: r.get(3)?,
                is_leader: r.get::<_, i64>(4)? != 0,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(students)
}

/// Replace every record a class has on `date` with `records`.
/// Returns whether anything was stored for that date before.
pub fn replace_attendance_day(
    conn: &Connection,
    class_id: &str,
    date: NaiveDate,
    records: &[AttendanceRecord],
    stamp: &str,
) -> anyhow::Result<bool> {
    let date = date.format("%Y-%m-%d").to_string();
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute(
        "DELETE FROM attendance WHERE class_id = ? AND date = ?",
        (class_id, &date),
    )?;
    {
        let mut insert = tx.prepare(
            "INSERT INTO attendance(class_id, date, student_id, status, reason, periods_json, memo, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        )?;
        for r in records {
            insert.execute((
                class_id,
                &date,
                &r.student_id,
                r.status.as_str(),
                r.reason.map(Reason::as_str),
                serde_json::to_string(&r.periods)?,
                &r.memo,
                stamp,
            ))?;
        }
    }
    tx.commit()?;
    Ok(removed > 0)
}

/// Records for a class with `from <= date <= to`, oldest first.
pub fn list_attendance(
    conn: &Connection,
    class_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<StoredRecord>> {
    let mut stmt = conn.prepare(
        "SELECT date, student_id, status, reason, periods_json, memo
         FROM attendance
         WHERE class_id = ? AND date >= ? AND date <= ?
         ORDER BY date, rowid",
    )?;
    let rows = stmt
        .query_map(
            (
                class_id,
                from.format("%Y-%m-%d").to_string(),
                to.format("%Y-%m-%d").to_string(),
            ),
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, Option<String>>(3)?,
                    r.get::<_, String>(4)?,
                    r.get::<_, String>(5)?,
                ))
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(date, student_id, status, reason, periods_json, memo)| -> anyhow::Result<StoredRecord> {
            let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                .with_context(|| format!("bad attendance date {date:?}"))?;
            let status = Status::parse(&status)
                .with_context(|| format!("bad attendance status {status:?}"))?;
            let reason = match reason {
                Some(r) => Some(Reason::parse(&r).with_context(|| format!("bad attendance reason {r:?}"))?),
                None => None,
            };
            let periods: Vec<u8> = serde_json::from_str(&periods_json)?;
            Ok(StoredRecord {
                date,
                record: AttendanceRecord {
                    student_id,
                    status,
                    reason,
                    periods,
                    memo,
                },
            })
        })
        .collect()
}

/// Distinct dates with saved attendance, ascending.
pub fn attendance_dates(
    conn: &Connection,
    class_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT date FROM attendance
         WHERE class_id = ? AND date >= ? AND date <= ?
         ORDER BY date",
    )?;
    let dates = stmt
        .query_map(
            (
                class_id,
                from.format("%Y-%m-%d").to_string(),
                to.format("%Y-%m-%d").to_string(),
            ),
            |r| r.get(0),
        )?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(dates)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
