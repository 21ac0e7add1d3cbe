use crate::ipc::error::{err, ok, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

// Pull-based surface over the in-process change bus: a list view subscribes
// for its course, polls after issuing writes, and unsubscribes when it goes
// away. Nothing here is durable or cross-process.

fn handle_subscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let course_id = match req.params.get("courseId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return HandlerErr::bad_params("missing courseId").response(&req.id),
    };
    let subscription_id = state.bus.subscribe(&course_id);
    ok(&req.id, json!({ "subscriptionId": subscription_id }))
}

fn handle_poll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subscription_id) = req.params.get("subscriptionId").and_then(|v| v.as_u64()) else {
        return HandlerErr::bad_params("missing subscriptionId").response(&req.id);
    };
    match state.bus.drain(subscription_id) {
        Some(events) => {
            let rows: Vec<_> = events
                .iter()
                .map(|e| json!({ "courseId": e.course_id }))
                .collect();
            ok(&req.id, json!({ "events": rows }))
        }
        None => err(&req.id, "not_found", "subscription not found", None),
    }
}

fn handle_unsubscribe(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(subscription_id) = req.params.get("subscriptionId").and_then(|v| v.as_u64()) else {
        return HandlerErr::bad_params("missing subscriptionId").response(&req.id);
    };
    let removed = state.bus.unsubscribe(subscription_id);
    ok(&req.id, json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "changes.subscribe" => Some(handle_subscribe(state, req)),
        "changes.poll" => Some(handle_poll(state, req)),
        "changes.unsubscribe" => Some(handle_unsubscribe(state, req)),
        _ => None,
    }
}
