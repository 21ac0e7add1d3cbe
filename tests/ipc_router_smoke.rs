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

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollbookd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollbookd");
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

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("rollbook-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let created = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "courses.create",
        json!({ "name": "Smoke Course" }),
    );
    let course_id = created
        .get("courseId")
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string();
    let _ = request_ok(&mut stdin, &mut reader, "4", "courses.list", json!({}));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "directory.upsertStudents",
        json!({ "students": [
            { "id": "s1", "name": "김민준", "email": "minjun@example.com" },
            { "id": "s2", "name": "이서연" }
        ]}),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "directory.resolve",
        json!({ "studentIds": ["s1", "missing"] }),
    );

    let sub = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "changes.subscribe",
        json!({ "courseId": course_id }),
    );
    let subscription_id = sub
        .get("subscriptionId")
        .and_then(|v| v.as_u64())
        .expect("subscriptionId");

    let group = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classGroups.create",
        json!({
            "courseId": course_id,
            "name": "1반",
            "periodCount": "2",
            "schedules": [
                { "day": "월", "period": "3" },
                { "day": "수", "period": "4" }
            ],
            "studentIds": ["s1", "s2"]
        }),
    );
    let class_group_id = group
        .get("id")
        .and_then(|v| v.as_str())
        .expect("class group id")
        .to_string();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "classGroups.list",
        json!({ "courseId": course_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "classGroups.update",
        json!({
            "classGroupId": class_group_id,
            "name": "1반",
            "periodCount": 1,
            "schedules": [{ "day": "월", "period": 3 }],
            "studentIds": ["s1", "s2"]
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "changes.poll",
        json!({ "subscriptionId": subscription_id }),
    );

    // 2024-03-04 is a Monday.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "attendance.sheetOpen",
        json!({ "courseId": course_id, "date": "2024-03-04" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "13",
        "attendance.setStatus",
        json!({
            "courseId": course_id,
            "classGroupId": class_group_id,
            "studentId": "s1",
            "status": "late"
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "14",
        "attendance.commit",
        json!({ "courseId": course_id, "classGroupId": class_group_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "attendance.load",
        json!({ "classGroupId": class_group_id, "date": "2024-03-04" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "16",
        "attendance.save",
        json!({
            "classGroupId": class_group_id,
            "date": "2024-03-04",
            "entries": [{ "studentId": "s1", "status": "present" }]
        }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "17",
        "attendance.recorded",
        json!({ "classGroupId": class_group_id, "date": "2024-03-04" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "18",
        "attendance.sheetClose",
        json!({ "courseId": course_id }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "19",
        "changes.unsubscribe",
        json!({ "subscriptionId": subscription_id }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
