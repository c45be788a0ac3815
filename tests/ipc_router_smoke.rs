use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_daemon() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_raw(
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

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request_raw(stdin, reader, id, method, params);
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn result_of(value: &serde_json::Value) -> &serde_json::Value {
    value.get("result").expect("result present")
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut child, mut stdin, mut reader) = spawn_daemon();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("ok"), Some(&json!(true)));

    let challenge = request(&mut stdin, &mut reader, "2", "auth.challenge", json!({}));
    let captcha = result_of(&challenge)
        .get("captcha")
        .and_then(|v| v.as_str())
        .expect("captcha")
        .to_string();

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "auth.refreshChallenge",
        json!({}),
    );
    let challenge = request(&mut stdin, &mut reader, "4", "auth.challenge", json!({}));
    let captcha2 = result_of(&challenge)
        .get("captcha")
        .and_then(|v| v.as_str())
        .expect("captcha")
        .to_string();
    assert_ne!(captcha, captcha2, "refresh must rotate the challenge");

    let login = request(
        &mut stdin,
        &mut reader,
        "5",
        "auth.login",
        json!({ "loginId": "FAC001", "password": "faculty123", "captcha": captcha2 }),
    );
    let session = result_of(&login)
        .get("session")
        .and_then(|v| v.as_str())
        .expect("session token")
        .to_string();

    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "auth.session",
        json!({}),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "attendance.mark",
        json!({
            "session": session,
            "studentId": "STU001",
            "date": "2024-02-01",
            "status": "Present",
            "classId": "Class A"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "attendance.edit",
        json!({
            "session": session,
            "studentId": "STU001",
            "date": "2024-02-01",
            "newStatus": "Absent"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "attendance.list",
        json!({ "session": session, "studentId": "STU001" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "attendance.studentSummary",
        json!({ "session": session, "studentId": "STU001" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "attendance.weeklySeries",
        json!({ "session": session, "studentId": "STU001" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "leave.list",
        json!({ "session": session }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "reports.dailyRate",
        json!({ "session": session, "date": "2024-01-02" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "reports.dailyTrend",
        json!({ "session": session, "classId": "Class A" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "reports.classReport",
        json!({ "session": session, "classId": "Class A" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "auth.logout",
        json!({ "session": session }),
    );

    let unknown = request_raw(
        &mut stdin,
        &mut reader,
        "17",
        "attendance.unknownMethod",
        json!({}),
    );
    assert_eq!(unknown.get("ok"), Some(&json!(false)));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}
