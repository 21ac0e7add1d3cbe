use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::{ClassGroup, ClassGroupInput};
use crate::store;
use serde_json::json;

fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

// The submission shape is shared by create and update; unknown keys such as
// courseId/classGroupId ride along and are ignored here.
fn parse_input(params: &serde_json::Value) -> Result<ClassGroupInput, HandlerErr> {
    serde_json::from_value(params.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid class group payload: {}", e)))
}

pub fn group_json(group: &ClassGroup) -> serde_json::Value {
    json!({
        "id": group.id,
        "courseId": group.course_id,
        "name": group.name,
        "periodCount": group.period_count,
        "schedules": group
            .schedules
            .iter()
            .map(|s| json!({ "day": s.day.label(), "period": s.period }))
            .collect::<Vec<_>>(),
        "studentIds": group.student_ids,
        "createdAt": group.created_at,
    })
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let course_id = match get_required_str(&req.params, "courseId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let input = match parse_input(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    match store::create_class_group(conn, &course_id, &input) {
        Ok(group) => {
            state.bus.publish(&course_id);
            ok(&req.id, group_json(&group))
        }
        Err(e) => HandlerErr::from_core(e, "db_insert_failed").response(&req.id),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let class_group_id = match get_required_str(&req.params, "classGroupId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let input = match parse_input(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    match store::update_class_group(conn, &class_group_id, &input) {
        Ok(group) => {
            state.bus.publish(&group.course_id);
            ok(&req.id, group_json(&group))
        }
        Err(e) => HandlerErr::from_core(e, "db_update_failed").response(&req.id),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classGroups": [] }));
    };

    let course_id = match get_required_str(&req.params, "courseId") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    match store::list_class_groups(conn, &course_id) {
        Ok(groups) => {
            let rows: Vec<_> = groups.iter().map(group_json).collect();
            ok(&req.id, json!({ "classGroups": rows }))
        }
        Err(e) => HandlerErr::from_core(e, "db_query_failed").response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classGroups.create" => Some(handle_create(state, req)),
        "classGroups.update" => Some(handle_update(state, req)),
        "classGroups.list" => Some(handle_list(state, req)),
        _ => None,
    }
}
