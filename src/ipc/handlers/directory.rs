use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

// Boundary to the external roster directory. The core only ever reads the
// mirror; these methods exist so the owning platform (and tests) can feed it.

fn upsert_students(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(students) = params.get("students").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing students"));
    };

    let tx = conn.unchecked_transaction().map_err(|e| HandlerErr {
        code: "db_tx_failed",
        message: e.to_string(),
        details: None,
    })?;

    let mut student_ids = Vec::with_capacity(students.len());
    for (idx, student) in students.iter().enumerate() {
        let name = student
            .get("name")
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let Some(name) = name else {
            return Err(HandlerErr::bad_params(format!(
                "students[{}] is missing a name",
                idx
            )));
        };
        let id = student
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let email = student.get("email").and_then(|v| v.as_str());

        tx.execute(
            "INSERT INTO students(id, name, email) VALUES(?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               email = excluded.email",
            (&id, name, email),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "students" })),
        })?;
        student_ids.push(id);
    }

    tx.commit().map_err(|e| HandlerErr {
        code: "db_commit_failed",
        message: e.to_string(),
        details: None,
    })?;

    Ok(json!({ "studentIds": student_ids }))
}

/// Display tuples for a list of roster ids, in input order. Ids the
/// directory cannot resolve come back as `resolved: false` rows; an
/// unresolvable id must never fail the view that asked.
pub fn resolve_rows(
    conn: &Connection,
    student_ids: &[String],
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut rows = Vec::with_capacity(student_ids.len());
    for student_id in student_ids {
        let found = conn
            .query_row(
                "SELECT name, email FROM students WHERE id = ?",
                [student_id],
                |r| Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?)),
            )
            .optional()
            .map_err(|e| HandlerErr {
                code: "db_query_failed",
                message: e.to_string(),
                details: None,
            })?;
        let row = match found {
            Some((name, email)) => json!({
                "studentId": student_id,
                "name": name,
                "email": email,
                "resolved": true
            }),
            None => json!({
                "studentId": student_id,
                "name": null,
                "email": null,
                "resolved": false
            }),
        };
        rows.push(row);
    }
    Ok(rows)
}

fn resolve(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(ids_json) = params.get("studentIds").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing studentIds"));
    };
    let student_ids: Vec<String> = ids_json
        .iter()
        .filter_map(|v| v.as_str().map(|s| s.to_string()))
        .collect();
    let rows = resolve_rows(conn, &student_ids)?;
    Ok(json!({ "students": rows }))
}

fn handle_upsert_students(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match upsert_students(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_resolve(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match resolve(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "directory.upsertStudents" => Some(handle_upsert_students(state, req)),
        "directory.resolve" => Some(handle_resolve(state, req)),
        _ => None,
    }
}
