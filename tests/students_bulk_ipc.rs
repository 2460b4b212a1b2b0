mod test_support;

use serde_json::json;
use test_support::{error_code, request_err, request_ok, spawn_sidecar, temp_dir};

#[test]
fn bulk_create_is_all_or_nothing() {
    let workspace = temp_dir("groupd-students-bulk");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class_id = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "1-4" }))
        ["classId"]
        .as_str()
        .expect("classId")
        .to_string();

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "students.bulkCreate",
        json!({
            "classId": class_id,
            "students": [
                { "number": 1, "name": "Ahn" },
                { "number": 2, "name": "   " },
            ]
        }),
    );
    assert_eq!(error_code(&e), "bad_params");
    assert_eq!(e["details"]["index"], json!(1));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "3b",
        "students.bulkCreate",
        json!({ "classId": class_id, "students": [] }),
    );
    assert_eq!(error_code(&e), "bad_params");

    let listed = request_ok(&mut stdin, &mut reader, "4", "students.list", json!({ "classId": class_id }));
    assert_eq!(listed["students"], json!([]));

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "students.bulkCreate",
        json!({
            "classId": class_id,
            "students": [
                { "number": 3, "name": "Cho", "score": 72.5 },
                { "number": 1, "name": "Ahn", "score": 90, "isLeader": true },
                { "number": 2, "name": "Baek" },
            ]
        }),
    );
    assert_eq!(created["created"], json!(3));
    assert_eq!(created["studentIds"].as_array().map(Vec::len), Some(3));

    let listed = request_ok(&mut stdin, &mut reader, "6", "students.list", json!({ "classId": class_id }));
    let rows = listed["students"].as_array().expect("students");
    let summary: Vec<(i64, &str, Option<f64>, bool)> = rows
        .iter()
        .map(|s| {
            (
                s["number"].as_i64().expect("number"),
                s["name"].as_str().expect("name"),
                s["score"].as_f64(),
                s["isLeader"].as_bool().expect("isLeader"),
            )
        })
        .collect();
    assert_eq!(
        summary,
        vec![
            (1, "Ahn", Some(90.0), true),
            (2, "Baek", None, false),
            (3, "Cho", Some(72.5), false),
        ]
    );
    assert_eq!(listed["students"][0]["id"], created["studentIds"][1]);
}

#[test]
fn score_update_matches_on_number_and_name() {
    let workspace = temp_dir("groupd-students-scores");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let class_id = request_ok(&mut stdin, &mut reader, "2", "classes.create", json!({ "name": "1-5" }))
        ["classId"]
        .as_str()
        .expect("classId")
        .to_string();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.bulkCreate",
        json!({
            "classId": class_id,
            "students": [
                { "number": 1, "name": "Ahn", "score": 50 },
                { "number": 2, "name": "Baek", "score": 60 },
                { "number": 3, "name": "Cho", "score": 70 },
            ]
        }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "students.updateScores",
        json!({
            "classId": class_id,
            "scores": [
                { "number": 1, "name": "Ahn", "score": 88 },
                { "number": 2, "name": "Cho", "score": 10 },
                { "number": 3, "name": "Cho", "score": null },
            ]
        }),
    );
    assert_eq!(
        result,
        json!({ "updated": 2, "unmatched": [{ "number": 2, "name": "Cho" }] })
    );

    let listed = request_ok(&mut stdin, &mut reader, "5", "students.list", json!({ "classId": class_id }));
    let scores: Vec<Option<f64>> = listed["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["score"].as_f64())
        .collect();
    assert_eq!(scores, vec![Some(88.0), Some(60.0), None]);

    let e = request_err(
        &mut stdin,
        &mut reader,
        "6",
        "students.updateScores",
        json!({ "classId": class_id, "scores": [{ "number": 9, "name": "Ahn", "score": 1 }] }),
    );
    assert_eq!(error_code(&e), "no_match");
    assert_eq!(e["details"]["unmatched"], json!([{ "number": 9, "name": "Ahn" }]));

    let e = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "students.updateScores",
        json!({ "classId": class_id, "scores": [{ "number": 1, "name": "Ahn", "score": -5 }] }),
    );
    assert_eq!(error_code(&e), "bad_params");
    assert_eq!(e["details"]["index"], json!(0));
}
