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

#[test]
fn register_login_and_role_convention() {
    let workspace = temp_dir("campusd-auth");
    let (_child, mut stdin, mut reader) = spawn_daemon();

    // No workspace selected yet.
    request_err(
        &mut stdin,
        &mut reader,
        "1",
        "auth.register",
        json!({ "username": "sam", "password": "hunter2" }),
        "no_workspace",
    );

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let student = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "auth.register",
        json!({ "username": "sam", "password": "hunter2" }),
    );
    assert_eq!(student.get("role").and_then(|v| v.as_str()), Some("student"));
    assert!(student.get("id").and_then(|v| v.as_str()).is_some());

    let teacher = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "auth.register",
        json!({ "username": "teacher_amy", "password": "secret" }),
    );
    assert_eq!(teacher.get("role").and_then(|v| v.as_str()), Some("teacher"));

    request_err(
        &mut stdin,
        &mut reader,
        "5",
        "auth.register",
        json!({ "username": "sam", "password": "other" }),
        "conflict",
    );
    request_err(
        &mut stdin,
        &mut reader,
        "6",
        "auth.register",
        json!({ "username": "  ", "password": "pw" }),
        "bad_params",
    );
    request_err(
        &mut stdin,
        &mut reader,
        "7",
        "auth.register",
        json!({ "username": "pat" }),
        "bad_params",
    );

    let login = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "auth.login",
        json!({ "username": "sam", "password": "hunter2" }),
    );
    assert_eq!(login.get("role").and_then(|v| v.as_str()), Some("student"));
    assert_eq!(
        login.get("id").and_then(|v| v.as_str()),
        student.get("id").and_then(|v| v.as_str())
    );

    request_err(
        &mut stdin,
        &mut reader,
        "9",
        "auth.login",
        json!({ "username": "sam", "password": "wrong" }),
        "unauthorized",
    );
    request_err(
        &mut stdin,
        &mut reader,
        "10",
        "auth.login",
        json!({ "username": "nobody", "password": "hunter2" }),
        "unauthorized",
    );
}
