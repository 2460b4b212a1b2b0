mod test_support;

use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{error_code, request_err, request_ok, spawn_sidecar, temp_dir};

struct Class {
    id: String,
    ahn: String,
    baek: String,
    cho: String,
}

fn seed(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, prefix: &str) -> Class {
    let workspace = temp_dir(prefix);
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class_id = request_ok(stdin, reader, "class", "classes.create", json!({ "name": "2-1" }))
        ["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let created = request_ok(
        stdin,
        reader,
        "bulk",
        "students.bulkCreate",
        json!({
            "classId": class_id,
            "students": [
                { "number": 1, "name": "Ahn" },
                { "number": 2, "name": "Baek" },
                { "number": 3, "name": "Cho" },
            ]
        }),
    );
    let ids: Vec<String> = created["studentIds"]
        .as_array()
        .expect("studentIds")
        .iter()
        .map(|v| v.as_str().expect("id").to_string())
        .collect();
    Class {
        id: class_id,
        ahn: ids[0].clone(),
        baek: ids[1].clone(),
        cho: ids[2].clone(),
    }
}

#[test]
fn save_validates_each_record_before_writing() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let c = seed(&mut stdin, &mut reader, "groupd-attendance-validate");

    let cases = [
        (
            json!([{ "studentId": c.ahn, "status": "absent" }]),
            "missing_reason",
            Some(c.ahn.as_str()),
        ),
        (
            json!([{ "studentId": c.baek, "status": "late", "reason": "illness", "periods": [] }]),
            "missing_periods",
            Some(c.baek.as_str()),
        ),
        (
            json!([{ "studentId": c.cho, "status": "earlyLeave", "reason": "illness", "periods": [9] }]),
            "invalid_period",
            Some(c.cho.as_str()),
        ),
        (
            json!([{ "studentId": c.cho, "status": "away", "reason": "illness" }]),
            "invalid_status",
            Some(c.cho.as_str()),
        ),
        (
            json!([
                { "studentId": c.ahn, "status": "present" },
                { "studentId": c.ahn, "status": "present" },
            ]),
            "duplicate_student",
            Some(c.ahn.as_str()),
        ),
        (
            json!([{ "studentId": "not-in-class", "status": "present" }]),
            "not_found",
            Some("not-in-class"),
        ),
    ];
    for (i, (records, code, student)) in cases.into_iter().enumerate() {
        let e = request_err(
            &mut stdin,
            &mut reader,
            &format!("bad-{i}"),
            "attendance.save",
            json!({ "classId": c.id, "date": "2024-04-03", "records": records }),
        );
        assert_eq!(error_code(&e), code, "{e}");
        assert_eq!(e["details"]["studentId"].as_str(), student);
    }

    for date in ["2024-4-3", "2024-02-30", "yesterday"] {
        let e = request_err(
            &mut stdin,
            &mut reader,
            date,
            "attendance.save",
            json!({ "classId": c.id, "date": date, "records": [] }),
        );
        assert_eq!(error_code(&e), "bad_params");
    }

    let dates = request_ok(
        &mut stdin,
        &mut reader,
        "dates",
        "attendance.dates",
        json!({ "classId": c.id, "month": "2024-04" }),
    );
    assert_eq!(dates["dates"], json!([]));
}

#[test]
fn saved_day_replaces_previous_record_set() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let c = seed(&mut stdin, &mut reader, "groupd-attendance-replace");

    let blank = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "attendance.get",
        json!({ "classId": c.id, "date": "2024-04-03" }),
    );
    assert_eq!(blank["saved"], json!(false));
    let records = blank["records"].as_array().expect("records");
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|r| r["status"] == json!("present") && r["recorded"] == json!(false)));

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.save",
        json!({
            "classId": c.id,
            "date": "2024-04-03",
            "records": [
                { "studentId": c.ahn, "status": "present", "reason": "illness", "periods": [1] },
                { "studentId": c.baek, "status": "late", "reason": "authorized", "periods": [2, 1, 2], "memo": "bus" },
                { "studentId": c.cho, "status": "absent", "reason": "illness", "periods": [4] },
            ]
        }),
    );
    assert_eq!(
        saved,
        json!({ "date": "2024-04-03", "saved": 3, "abnormalCount": 2, "replaced": false })
    );

    let day = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "attendance.get",
        json!({ "classId": c.id, "date": "2024-04-03" }),
    );
    assert_eq!(day["saved"], json!(true));
    assert_eq!(
        day["records"],
        json!([
            { "number": 1, "name": "Ahn", "studentId": c.ahn, "status": "present",
              "reason": null, "periods": [], "memo": "", "recorded": true },
            { "number": 2, "name": "Baek", "studentId": c.baek, "status": "late",
              "reason": "authorized", "periods": [1, 2], "memo": "bus", "recorded": true },
            { "number": 3, "name": "Cho", "studentId": c.cho, "status": "absent",
              "reason": "illness", "periods": [], "memo": "", "recorded": true },
        ])
    );

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.save",
        json!({
            "classId": c.id,
            "date": "2024-04-03",
            "records": [{ "studentId": c.cho, "status": "absent", "reason": "unauthorized" }]
        }),
    );
    assert_eq!(again["replaced"], json!(true));
    let day = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "attendance.get",
        json!({ "classId": c.id, "date": "2024-04-03" }),
    );
    assert_eq!(day["records"][1]["status"], json!("present"));
    assert_eq!(day["records"][1]["recorded"], json!(false));
    assert_eq!(day["records"][2]["reason"], json!("unauthorized"));
}

#[test]
fn month_and_student_views_summarize_abnormal_records() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let c = seed(&mut stdin, &mut reader, "groupd-attendance-views");

    let days = [
        (
            "2024-04-03",
            json!([
                { "studentId": c.cho, "status": "absent", "reason": "illness" },
                { "studentId": c.ahn, "status": "absent", "reason": "authorized" },
                { "studentId": c.baek, "status": "present" },
            ]),
        ),
        (
            "2024-04-10",
            json!([{ "studentId": c.ahn, "status": "earlyLeave", "reason": "unauthorized", "periods": [5] }]),
        ),
        (
            "2024-05-02",
            json!([{ "studentId": c.ahn, "status": "absent", "reason": "illness" }]),
        ),
    ];
    for (date, records) in days {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            date,
            "attendance.save",
            json!({ "classId": c.id, "date": date, "records": records }),
        );
    }

    let dates = request_ok(
        &mut stdin,
        &mut reader,
        "dates",
        "attendance.dates",
        json!({ "classId": c.id, "month": "2024-04" }),
    );
    assert_eq!(dates, json!({ "month": "2024-04", "dates": ["2024-04-03", "2024-04-10"] }));

    let month = request_ok(
        &mut stdin,
        &mut reader,
        "month",
        "attendance.month",
        json!({ "classId": c.id, "month": "2024-04" }),
    );
    let rows = month["days"].as_array().expect("days");
    assert_eq!(rows.len(), 30);
    assert_eq!(rows[0]["abnormalCount"], json!(0));
    assert_eq!(rows[2]["date"], json!("2024-04-03"));
    assert_eq!(rows[2]["abnormalCount"], json!(2));
    assert_eq!(rows[2]["statuses"][0]["status"], json!("absent"));
    let names: Vec<&str> = rows[2]["statuses"][0]["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Ahn", "Cho"]);
    assert_eq!(rows[9]["statuses"][0]["status"], json!("earlyLeave"));

    let students = request_ok(
        &mut stdin,
        &mut reader,
        "student",
        "attendance.student",
        json!({ "classId": c.id, "month": "2024-04" }),
    );
    let rows = students["students"].as_array().expect("students");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["name"], json!("Ahn"));
    assert_eq!(rows[0]["absent"], json!(["2024-04-03"]));
    assert_eq!(rows[0]["earlyLeave"], json!(["2024-04-10"]));
    assert_eq!(rows[1]["absent"], json!([]));
    assert_eq!(rows[2]["absent"], json!(["2024-04-03"]));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "bad-month",
        "attendance.month",
        json!({ "classId": c.id, "month": "2024-13" }),
    );
    assert_eq!(error_code(&e), "bad_params");
}

#[test]
fn deleting_students_and_classes_removes_their_attendance() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let c = seed(&mut stdin, &mut reader, "groupd-attendance-delete");

    for (date, student) in [("2024-04-03", &c.cho), ("2024-04-04", &c.ahn)] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            date,
            "attendance.save",
            json!({
                "classId": c.id,
                "date": date,
                "records": [{ "studentId": student, "status": "absent", "reason": "illness" }]
            }),
        );
    }

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del-student",
        "students.delete",
        json!({ "classId": c.id, "studentId": c.cho }),
    );
    let dates = request_ok(
        &mut stdin,
        &mut reader,
        "dates",
        "attendance.dates",
        json!({ "classId": c.id, "month": "2024-04" }),
    );
    assert_eq!(dates["dates"], json!(["2024-04-04"]));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "del-class",
        "classes.delete",
        json!({ "classId": c.id }),
    );
    let e = request_err(
        &mut stdin,
        &mut reader,
        "after",
        "attendance.dates",
        json!({ "classId": c.id, "month": "2024-04" }),
    );
    assert_eq!(error_code(&e), "not_found");
    let listed = request_ok(&mut stdin, &mut reader, "list", "classes.list", json!({}));
    assert_eq!(listed["classes"], json!([]));
}
