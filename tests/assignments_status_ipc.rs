use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_campusd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn campusd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
    expected_code: &str,
) {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    assert_eq!(
        value.pointer("/error/code").and_then(|v| v.as_str()),
        Some(expected_code),
        "unexpected error code for {}: {}",
        method,
        value
    );
}

fn str_of(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, value))
        .to_string()
}

#[test]
fn per_user_status_drives_listing_and_overdue() {
    let workspace = temp_dir("campusd-assignments");
    let (_child, mut stdin, mut reader) = spawn_daemon();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let student = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "auth.register",
        json!({ "username": "sam", "password": "hunter2" }),
    );
    let user_id = str_of(&student, "id");
    let course = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({ "code": "CS101", "name": "Programming" }),
    );
    let course_id = str_of(&course, "id");

    request_err(
        &mut stdin,
        &mut reader,
        "4",
        "assignments.create",
        json!({ "courseId": "missing", "title": "X", "dueDate": "2026-03-10" }),
        "not_found",
    );
    request_err(
        &mut stdin,
        &mut reader,
        "5",
        "assignments.create",
        json!({ "courseId": course_id, "title": "X", "dueDate": "soon" }),
        "bad_params",
    );

    // One due far in the past, one far in the future.
    let late = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "assignments.create",
        json!({ "courseId": course_id, "title": "Late essay", "dueDate": "2000-01-01" }),
    );
    let late_id = str_of(&late, "id");
    let project = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "assignments.create",
        json!({
            "courseId": course_id,
            "title": "Project",
            "dueDate": "2099-12-31",
            "description": "Final project."
        }),
    );
    let project_id = str_of(&project, "id");

    // Without a user there is no status column at all.
    let bare = request_ok(&mut stdin, &mut reader, "8", "assignments.list", json!({}));
    let bare_rows = bare
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments array");
    assert_eq!(bare_rows.len(), 2);
    assert!(bare_rows[0].get("status").is_none());

    // Unset status reads as todo; past due and not done means overdue.
    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "assignments.list",
        json!({ "userId": user_id }),
    );
    let rows = listed
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments array");
    assert_eq!(rows[0].get("id").and_then(|v| v.as_str()), Some(late_id.as_str()));
    assert_eq!(rows[0].get("status").and_then(|v| v.as_str()), Some("todo"));
    assert_eq!(rows[0].get("overdue").and_then(|v| v.as_bool()), Some(true));
    assert_eq!(rows[0].get("completed").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(rows[1].get("overdue").and_then(|v| v.as_bool()), Some(false));

    request_err(
        &mut stdin,
        &mut reader,
        "10",
        "assignments.setStatus",
        json!({ "assignmentId": late_id, "userId": user_id, "status": "finished" }),
        "bad_params",
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "assignments.setStatus",
        json!({ "assignmentId": late_id, "userId": user_id, "status": "in_progress" }),
    );
    // Upsert: a second set replaces, not duplicates.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "assignments.setStatus",
        json!({ "assignmentId": late_id, "userId": user_id, "status": "done" }),
    );

    let relisted = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "assignments.list",
        json!({ "userId": user_id }),
    );
    let rows = relisted
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments array");
    assert_eq!(rows[0].get("status").and_then(|v| v.as_str()), Some("done"));
    assert_eq!(rows[0].get("completed").and_then(|v| v.as_bool()), Some(true));
    // Done clears overdue even with a past due date.
    assert_eq!(rows[0].get("overdue").and_then(|v| v.as_bool()), Some(false));

    let renamed = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "assignments.update",
        json!({ "assignmentId": project_id, "title": "Capstone project" }),
    );
    assert_eq!(
        renamed.get("title").and_then(|v| v.as_str()),
        Some("Capstone project")
    );
    assert_eq!(
        renamed.get("description").and_then(|v| v.as_str()),
        Some("Final project.")
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "assignments.delete",
        json!({ "assignmentId": late_id }),
    );
    request_err(
        &mut stdin,
        &mut reader,
        "16",
        "assignments.setStatus",
        json!({ "assignmentId": late_id, "userId": user_id, "status": "todo" }),
        "not_found",
    );

    let after_delete = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "assignments.list",
        json!({ "userId": user_id }),
    );
    let rows = after_delete
        .get("assignments")
        .and_then(|v| v.as_array())
        .expect("assignments array");
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].get("id").and_then(|v| v.as_str()),
        Some(project_id.as_str())
    );
}
