use super::required_str;
use crate::db;
use crate::ipc::{err, ok, AppState, Request};
use chrono::NaiveDate;
use serde_json::json;

/// Marks come from a form field too; accept a JSON number or a numeric
/// string, and require the 0..=100 range either way.
fn parse_marks(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    let n = if let Some(n) = v.as_f64() {
        n
    } else {
        v.as_str()?.trim().parse::<f64>().ok()?
    };
    if n.is_finite() && (0.0..=100.0).contains(&n) {
        Some(n)
    } else {
        None
    }
}

fn handle_marks_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll_no = match required_str(req, "rollNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let subject = match required_str(req, "subject") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(marks) = parse_marks(req.params.get("marks")) else {
        return err(
            &req.id,
            "bad_params",
            "marks must be a number between 0 and 100",
            None,
        );
    };
    let exam_date = match req.params.get("examDate") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_str().map(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")) {
            // The parser tolerates unpadded parts; store the canonical
            // zero-padded rendering.
            Some(Ok(d)) => Some(d.to_string()),
            _ => return err(&req.id, "bad_params", "examDate must be YYYY-MM-DD", None),
        },
    };

    // Reject before inserting so no orphan mark can appear.
    match db::student_exists(conn, &roll_no) {
        Ok(true) => {}
        Ok(false) => {
            return err(
                &req.id,
                "not_found",
                format!("no student with roll number {roll_no}"),
                None,
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    }

    match db::insert_mark(conn, &roll_no, &subject, marks, exam_date.as_deref()) {
        Ok(inserted) => ok(
            &req.id,
            json!({
                "markId": inserted.id,
                "rollNo": roll_no,
                "subject": subject,
                "marks": marks,
                "examDate": inserted.exam_date
            }),
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "marks" })),
        ),
    }
}

fn handle_marks_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll_no = match required_str(req, "rollNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::marks_for(conn, &roll_no) {
        Ok(marks) => ok(&req.id, json!({ "rollNo": roll_no, "marks": marks })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_marks_joined(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match db::all_marks_joined(conn) {
        Ok(rows) => ok(&req.id, json!({ "rows": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.add" => Some(handle_marks_add(state, req)),
        "marks.forStudent" => Some(handle_marks_for_student(state, req)),
        "marks.joined" => Some(handle_marks_joined(state, req)),
        _ => None,
    }
}
