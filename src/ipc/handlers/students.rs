use super::required_str;
use crate::db;
use crate::ipc::{err, ok, AppState, Request};
use serde_json::json;

/// Age arrives from a form field, so a numeric string is as good as a
/// JSON number.
fn parse_age(v: Option<&serde_json::Value>) -> Option<i64> {
    let v = v?;
    let n = if let Some(n) = v.as_i64() {
        n
    } else {
        v.as_str()?.trim().parse::<i64>().ok()?
    };
    if n > 0 {
        Some(n)
    } else {
        None
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll_no = match required_str(req, "rollNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(age) = parse_age(req.params.get("age")) else {
        return err(&req.id, "bad_params", "age must be a positive integer", None);
    };
    let class_name = match required_str(req, "className") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::insert_student(conn, &roll_no, &name, age, &class_name) {
        Ok(db::StudentInsert::Created { created_date }) => ok(
            &req.id,
            json!({
                "rollNo": roll_no,
                "name": name,
                "age": age,
                "className": class_name,
                "createdDate": created_date
            }),
        ),
        Ok(db::StudentInsert::DuplicateRollNo) => err(
            &req.id,
            "duplicate_roll_no",
            format!("roll number {roll_no} is already registered"),
            None,
        ),
        Err(e) => err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        ),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    // No workspace yet means nothing recorded; answer with an empty
    // roster so a dashboard can render before the first select.
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    match db::list_students(conn) {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let roll_no = match required_str(req, "rollNo") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::delete_student(conn, &roll_no) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "rollNo": roll_no,
                "deletedMarks": outcome.deleted_marks,
                "deletedStudent": outcome.deleted_student
            }),
        ),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        ),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
