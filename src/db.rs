use chrono::Local;
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("studentperf.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            roll_no TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            class_name TEXT NOT NULL,
            created_date TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS marks(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            roll_no TEXT NOT NULL,
            subject TEXT NOT NULL,
            marks REAL NOT NULL,
            max_marks REAL NOT NULL DEFAULT 100,
            exam_date TEXT NOT NULL,
            FOREIGN KEY(roll_no) REFERENCES students(roll_no)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_marks_roll ON marks(roll_no)",
        [],
    )?;

    Ok(conn)
}

/// Local calendar date as `YYYY-MM-DD`.
pub fn today() -> String {
    Local::now().date_naive().to_string()
}

pub enum StudentInsert {
    Created { created_date: String },
    DuplicateRollNo,
}

/// Stamps `created_date` with the current local date. A duplicate roll
/// number leaves the table untouched.
pub fn insert_student(
    conn: &Connection,
    roll_no: &str,
    name: &str,
    age: i64,
    class_name: &str,
) -> anyhow::Result<StudentInsert> {
    if student_exists(conn, roll_no)? {
        return Ok(StudentInsert::DuplicateRollNo);
    }
    let created_date = today();
    conn.execute(
        "INSERT INTO students(roll_no, name, age, class_name, created_date)
         VALUES(?, ?, ?, ?, ?)",
        (roll_no, name, age, class_name, &created_date),
    )?;
    Ok(StudentInsert::Created { created_date })
}

pub fn student_exists(conn: &Connection, roll_no: &str) -> anyhow::Result<bool> {
    let mut stmt = conn.prepare("SELECT 1 FROM students WHERE roll_no = ?")?;
    Ok(stmt.exists([roll_no])?)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub roll_no: String,
    pub name: String,
    pub age: i64,
    pub class_name: String,
    pub created_date: String,
    pub mark_count: i64,
}

pub fn list_students(conn: &Connection) -> anyhow::Result<Vec<StudentRow>> {
    // Correlated subquery for the count to avoid double-counting from joins.
    let mut stmt = conn.prepare(
        "SELECT
           s.roll_no,
           s.name,
           s.age,
           s.class_name,
           s.created_date,
           (SELECT COUNT(*) FROM marks m WHERE m.roll_no = s.roll_no) AS mark_count
         FROM students s
         ORDER BY s.roll_no",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StudentRow {
                roll_no: row.get(0)?,
                name: row.get(1)?,
                age: row.get(2)?,
                class_name: row.get(3)?,
                created_date: row.get(4)?,
                mark_count: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct InsertedMark {
    pub id: i64,
    pub exam_date: String,
}

/// `exam_date` defaults to the current local date when not supplied.
pub fn insert_mark(
    conn: &Connection,
    roll_no: &str,
    subject: &str,
    marks: f64,
    exam_date: Option<&str>,
) -> anyhow::Result<InsertedMark> {
    let exam_date = match exam_date {
        Some(d) => d.to_string(),
        None => today(),
    };
    conn.execute(
        "INSERT INTO marks(roll_no, subject, marks, exam_date) VALUES(?, ?, ?, ?)",
        (roll_no, subject, marks, &exam_date),
    )?;
    Ok(InsertedMark {
        id: conn.last_insert_rowid(),
        exam_date,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRow {
    pub subject: String,
    pub marks: f64,
    pub exam_date: String,
}

pub fn marks_for(conn: &Connection, roll_no: &str) -> anyhow::Result<Vec<MarkRow>> {
    let mut stmt = conn.prepare(
        "SELECT subject, marks, exam_date
         FROM marks
         WHERE roll_no = ?
         ORDER BY subject, id",
    )?;
    let rows = stmt
        .query_map([roll_no], |row| {
            Ok(MarkRow {
                subject: row.get(0)?,
                marks: row.get(1)?,
                exam_date: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// One mark joined to its student, the input row for every report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinedMark {
    pub roll_no: String,
    pub name: String,
    pub subject: String,
    pub marks: f64,
}

pub fn all_marks_joined(conn: &Connection) -> anyhow::Result<Vec<JoinedMark>> {
    let mut stmt = conn.prepare(
        "SELECT s.roll_no, s.name, m.subject, m.marks
         FROM marks m
         JOIN students s ON s.roll_no = m.roll_no
         ORDER BY s.roll_no, m.subject, m.id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(JoinedMark {
                roll_no: row.get(0)?,
                name: row.get(1)?,
                subject: row.get(2)?,
                marks: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct DeleteOutcome {
    pub deleted_marks: usize,
    pub deleted_student: bool,
}

/// Marks first, then the student row (no ON DELETE CASCADE), in one
/// transaction. Succeeds whether or not the student existed.
pub fn delete_student(conn: &Connection, roll_no: &str) -> anyhow::Result<DeleteOutcome> {
    let tx = conn.unchecked_transaction()?;
    let deleted_marks = tx.execute("DELETE FROM marks WHERE roll_no = ?", [roll_no])?;
    let deleted_student = tx.execute("DELETE FROM students WHERE roll_no = ?", [roll_no])?;
    tx.commit()?;
    Ok(DeleteOutcome {
        deleted_marks,
        deleted_student: deleted_student > 0,
    })
}
