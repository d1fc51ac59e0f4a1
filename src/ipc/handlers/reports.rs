use crate::calc;
use crate::db;
use crate::ipc::{err, ok, AppState, Request};
use rusqlite::Connection;
use serde_json::json;

fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Every report starts from the same joined snapshot. An empty snapshot
/// answers `empty_dataset` so the front end can say "no data yet"
/// instead of charting nothing.
fn joined_rows(state: &AppState, req: &Request) -> Result<Vec<db::JoinedMark>, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let rows = db::all_marks_joined(conn)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    if rows.is_empty() {
        return Err(err(&req.id, "empty_dataset", "no marks recorded yet", None));
    }
    Ok(rows)
}

fn handle_analysis_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match joined_rows(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let values: Vec<f64> = rows.iter().map(|r| r.marks).collect();
    let Some(overall) = calc::overall_stats(&values) else {
        return err(&req.id, "empty_dataset", "no marks recorded yet", None);
    };
    let per_student = calc::student_summaries(&rows);

    ok(
        &req.id,
        json!({
            "totalRecords": rows.len(),
            "totalStudents": per_student.len(),
            "overall": overall,
            "perStudent": per_student,
            "perSubject": calc::subject_summaries(&rows)
        }),
    )
}

fn handle_student_averages(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match joined_rows(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let students: Vec<serde_json::Value> = calc::student_summaries(&rows)
        .into_iter()
        .map(|s| json!({ "rollNo": s.roll_no, "name": s.name, "average": s.average }))
        .collect();
    ok(&req.id, json!({ "students": students }))
}

fn handle_subject_averages(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match joined_rows(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let subjects: Vec<serde_json::Value> = calc::subject_summaries(&rows)
        .into_iter()
        .map(|s| json!({ "subject": s.subject, "average": s.mean }))
        .collect();
    ok(&req.id, json!({ "subjects": subjects }))
}

fn handle_grade_distribution(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match joined_rows(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    ok(&req.id, json!({ "buckets": calc::grade_distribution(&rows) }))
}

fn handle_performance_matrix(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match joined_rows(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let matrix = calc::performance_matrix(&rows);
    ok(
        &req.id,
        json!({
            "rollNos": matrix.roll_nos,
            "subjects": matrix.subjects,
            "cells": matrix.cells
        }),
    )
}

fn handle_subject_distribution(state: &mut AppState, req: &Request) -> serde_json::Value {
    let rows = match joined_rows(state, req) {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    ok(&req.id, json!({ "subjects": calc::subject_mark_series(&rows) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analysis.overview" => Some(handle_analysis_overview(state, req)),
        "charts.studentAverages" => Some(handle_student_averages(state, req)),
        "charts.subjectAverages" => Some(handle_subject_averages(state, req)),
        "charts.gradeDistribution" => Some(handle_grade_distribution(state, req)),
        "charts.performanceMatrix" => Some(handle_performance_matrix(state, req)),
        "charts.subjectDistribution" => Some(handle_subject_distribution(state, req)),
        _ => None,
    }
}
