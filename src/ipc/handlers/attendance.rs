use crate::editor::{EditorSession, GroupPanel};
use crate::error::CoreError;
use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::handlers::directory;
use crate::ipc::types::{AppState, Request};
use crate::ledger;
use crate::model::{parse_wire_date, AttendanceEntry, AttendanceStatus};
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

fn get_required_date(params: &serde_json::Value, key: &str) -> Result<NaiveDate, HandlerErr> {
    let raw = get_required_str(params, key)?;
    parse_wire_date(&raw)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(raw) = v.as_str() else {
        return Err(HandlerErr::bad_params(format!("{} must be a string", key)));
    };
    parse_wire_date(raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

fn get_optional_status(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<AttendanceStatus>, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Ok(None);
    };
    if v.is_null() {
        return Ok(None);
    }
    let Some(raw) = v.as_str() else {
        return Err(HandlerErr::bad_params("status must be a string or null"));
    };
    AttendanceStatus::from_str(raw)
        .map(Some)
        .ok_or_else(|| HandlerErr::bad_params(format!("unknown status: {}", raw)))
}

fn parse_entries(params: &serde_json::Value) -> Result<Vec<AttendanceEntry>, HandlerErr> {
    let Some(v) = params.get("entries") else {
        return Err(HandlerErr::bad_params("missing entries"));
    };
    serde_json::from_value(v.clone()).map_err(|e| {
        HandlerErr::bad_params(format!("entries must be {{studentId, status}} pairs: {}", e))
    })
}

fn date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

// ---- ledger surface ----

fn attendance_load(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_group_id = get_required_str(params, "classGroupId")?;
    let date = get_required_date(params, "date")?;
    store::get_class_group(conn, &class_group_id)
        .map_err(|e| HandlerErr::from_core(e, "db_query_failed"))?;

    let recorded = ledger::load_for_date(conn, &class_group_id, date)
        .map_err(|e| HandlerErr::from_core(e, "db_query_failed"))?;
    let entries: Vec<_> = recorded
        .iter()
        .map(|(student_id, status)| {
            json!({ "studentId": student_id, "status": status.as_str() })
        })
        .collect();
    Ok(json!({ "entries": entries }))
}

fn attendance_save(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_group_id = get_required_str(params, "classGroupId")?;
    let date = get_required_date(params, "date")?;
    let entries = parse_entries(params)?;
    store::get_class_group(conn, &class_group_id)
        .map_err(|e| HandlerErr::from_core(e, "db_query_failed"))?;

    let saved = ledger::save(conn, &class_group_id, date, &entries)
        .map_err(|e| HandlerErr::from_core(e, "db_update_failed"))?;
    Ok(json!({ "savedCount": saved }))
}

fn attendance_recorded(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_group_id = get_required_str(params, "classGroupId")?;
    let date = get_required_date(params, "date")?;
    let recorded = ledger::exists_for_date(conn, &class_group_id, date)
        .map_err(|e| HandlerErr::from_core(e, "db_query_failed"))?;
    Ok(json!({ "recorded": recorded }))
}

// ---- editing surface ----

fn panel_json(conn: &Connection, panel: &GroupPanel) -> Result<serde_json::Value, HandlerErr> {
    let mut students = directory::resolve_rows(conn, &panel.group.student_ids)?;
    for (student_id, row) in panel.group.student_ids.iter().zip(students.iter_mut()) {
        if let Some((status, explicit)) = panel.status_of(student_id) {
            row["status"] = json!(status.as_str());
            row["explicit"] = json!(explicit);
        }
    }

    Ok(json!({
        "id": panel.group.id,
        "name": panel.group.name,
        "periodCount": panel.group.period_count,
        "schedules": panel
            .group
            .schedules
            .iter()
            .map(|s| json!({ "day": s.day.label(), "period": s.period }))
            .collect::<Vec<_>>(),
        "meetsOnDate": panel.meets,
        "editable": panel.editable(),
        "recorded": panel.saved(),
        "inFlight": panel.in_flight(),
        "students": students,
    }))
}

fn sheet_json(conn: &Connection, session: &EditorSession) -> Result<serde_json::Value, HandlerErr> {
    let mut groups = Vec::with_capacity(session.panels().len());
    for panel in session.panels() {
        groups.push(panel_json(conn, panel)?);
    }
    Ok(json!({
        "courseId": session.course_id,
        "date": session.date.map(date_string),
        "classGroups": groups,
    }))
}

fn handle_sheet_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { db, sessions, .. } = state;
    let Some(conn) = db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match get_required_str(&req.params, "courseId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let date = match get_optional_date(&req.params, "date") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match store::course_exists(conn, &course_id) {
        Ok(true) => {}
        Ok(false) => return err(&req.id, "not_found", "course not found", None),
        Err(e) => return HandlerErr::from_core(e, "db_query_failed").response(&req.id),
    }

    // Same course and date: keep the open sheet and its unsaved edits.
    // Anything else replaces the session, discarding them.
    let reuse = sessions
        .get(&course_id)
        .is_some_and(|s| s.date == date);
    if !reuse {
        match EditorSession::open(conn, &course_id, date) {
            Ok(session) => {
                sessions.insert(course_id.clone(), session);
            }
            Err(e) => return HandlerErr::from_core(e, "db_query_failed").response(&req.id),
        }
    }

    let Some(session) = sessions.get(&course_id) else {
        return err(&req.id, "internal", "sheet session unavailable", None);
    };
    match sheet_json(conn, session) {
        Ok(result) => ok(&req.id, result),
        Err(e) => e.response(&req.id),
    }
}

fn handle_set_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { db, sessions, .. } = state;
    let Some(conn) = db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match get_required_str(&req.params, "courseId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let class_group_id = match get_required_str(&req.params, "classGroupId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let student_id = match get_required_str(&req.params, "studentId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let status = match get_optional_status(&req.params, "status") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let Some(session) = sessions.get_mut(&course_id) else {
        return err(&req.id, "no_sheet", "open an attendance sheet first", None);
    };
    if let Err(e) = session.set_status(&class_group_id, &student_id, status) {
        return HandlerErr::from_core(e, "db_update_failed").response(&req.id);
    }

    let Some(panel) = session.panel(&class_group_id) else {
        return err(&req.id, "internal", "panel unavailable after edit", None);
    };
    match panel_json(conn, panel) {
        Ok(result) => ok(&req.id, json!({ "classGroup": result })),
        Err(e) => e.response(&req.id),
    }
}

fn handle_commit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let AppState { db, sessions, .. } = state;
    let Some(conn) = db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match get_required_str(&req.params, "courseId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let class_group_id = match get_required_str(&req.params, "classGroupId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let Some(session) = sessions.get_mut(&course_id) else {
        return err(&req.id, "no_sheet", "open an attendance sheet first", None);
    };
    match session.commit(conn, &class_group_id) {
        Ok(saved_count) => ok(
            &req.id,
            json!({ "savedCount": saved_count, "recorded": true }),
        ),
        Err(e) => {
            if matches!(e, CoreError::Db(_)) {
                tracing::warn!(class_group = %class_group_id, error = %e, "attendance save failed");
            }
            HandlerErr::from_core(e, "db_update_failed").response(&req.id)
        }
    }
}

fn handle_sheet_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match get_required_str(&req.params, "courseId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let closed = state.sessions.remove(&course_id).is_some();
    ok(&req.id, json!({ "closed": closed }))
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_load(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_save(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

fn handle_recorded(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match attendance_recorded(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.load" => Some(handle_load(state, req)),
        "attendance.save" => Some(handle_save(state, req)),
        "attendance.recorded" => Some(handle_recorded(state, req)),
        "attendance.sheetOpen" => Some(handle_sheet_open(state, req)),
        "attendance.setStatus" => Some(handle_set_status(state, req)),
        "attendance.commit" => Some(handle_commit(state, req)),
        "attendance.sheetClose" => Some(handle_sheet_close(state, req)),
        _ => None,
    }
}
