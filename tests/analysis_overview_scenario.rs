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
    let exe = env!("CARGO_BIN_EXE_studentperfd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn studentperfd");
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

fn f64_at<'a>(value: &'a serde_json::Value, key: &str) -> f64 {
    value
        .get(key)
        .and_then(|v| v.as_f64())
        .unwrap_or_else(|| panic!("missing f64 {}: {}", key, value))
}

fn approx(a: f64, b: f64) {
    assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
}

#[test]
fn overview_matches_the_two_student_worked_example() {
    let workspace = temp_dir("studentperf-overview");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "students.create",
        json!({ "rollNo": "S1", "name": "Asha", "age": 20, "className": "10A" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "rollNo": "S2", "name": "Ravi", "age": 21, "className": "10A" }),
    );

    // Students alone are not a dataset yet.
    let empty = request(&mut stdin, &mut reader, "4", "analysis.overview", json!({}));
    assert_eq!(empty.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        empty
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("empty_dataset")
    );

    for (id, roll, subject, marks) in [
        ("5", "S1", "Math", 95),
        ("6", "S1", "Science", 85),
        ("7", "S2", "Math", 55),
        ("8", "S2", "Science", 45),
    ] {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            id,
            "marks.add",
            json!({ "rollNo": roll, "subject": subject, "marks": marks }),
        );
    }

    let overview = request_ok(&mut stdin, &mut reader, "9", "analysis.overview", json!({}));
    assert_eq!(
        overview.get("totalRecords").and_then(|v| v.as_i64()),
        Some(4)
    );
    assert_eq!(
        overview.get("totalStudents").and_then(|v| v.as_i64()),
        Some(2)
    );

    let overall = overview.get("overall").expect("overall");
    assert_eq!(overall.get("count").and_then(|v| v.as_i64()), Some(4));
    approx(f64_at(overall, "mean"), 70.0);
    approx(f64_at(overall, "median"), 70.0);
    approx(f64_at(overall, "stdDev"), 425.0_f64.sqrt());
    approx(f64_at(overall, "min"), 45.0);
    approx(f64_at(overall, "max"), 95.0);
    approx(f64_at(overall, "p25"), 52.5);
    approx(f64_at(overall, "p75"), 87.5);

    let per_student = overview
        .get("perStudent")
        .and_then(|v| v.as_array())
        .expect("perStudent");
    assert_eq!(per_student.len(), 2);
    assert_eq!(
        per_student[0].get("rollNo").and_then(|v| v.as_str()),
        Some("S1")
    );
    assert_eq!(
        per_student[0].get("name").and_then(|v| v.as_str()),
        Some("Asha")
    );
    approx(f64_at(&per_student[0], "average"), 90.0);
    approx(f64_at(&per_student[0], "total"), 180.0);
    assert_eq!(
        per_student[0].get("grade").and_then(|v| v.as_str()),
        Some("A+")
    );
    assert_eq!(
        per_student[1].get("rollNo").and_then(|v| v.as_str()),
        Some("S2")
    );
    approx(f64_at(&per_student[1], "average"), 50.0);
    approx(f64_at(&per_student[1], "total"), 100.0);
    assert_eq!(
        per_student[1].get("grade").and_then(|v| v.as_str()),
        Some("D")
    );

    let per_subject = overview
        .get("perSubject")
        .and_then(|v| v.as_array())
        .expect("perSubject");
    assert_eq!(per_subject.len(), 2);
    assert_eq!(
        per_subject[0].get("subject").and_then(|v| v.as_str()),
        Some("Math")
    );
    approx(f64_at(&per_subject[0], "mean"), 75.0);
    approx(f64_at(&per_subject[0], "stdDev"), 20.0);
    approx(f64_at(&per_subject[0], "min"), 55.0);
    approx(f64_at(&per_subject[0], "max"), 95.0);
    assert_eq!(
        per_subject[1].get("subject").and_then(|v| v.as_str()),
        Some("Science")
    );
    approx(f64_at(&per_subject[1], "mean"), 65.0);
    approx(f64_at(&per_subject[1], "stdDev"), 20.0);

    drop(stdin);
    let _ = std::fs::remove_dir_all(workspace);
}
