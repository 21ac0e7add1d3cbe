use serde_json::json;

use crate::error::CoreError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Handler-local failure carrying the wire error envelope fields.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    pub fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    /// Maps a core failure onto the wire vocabulary. `db_code` names the
    /// operation that was running when SQLite failed (query vs. update).
    pub fn from_core(e: CoreError, db_code: &'static str) -> HandlerErr {
        match e {
            CoreError::Validation { field, message } => HandlerErr {
                code: "validation_failed",
                message,
                details: Some(json!({ "field": field })),
            },
            CoreError::NotFound(what) => HandlerErr {
                code: "not_found",
                message: format!("{} not found", what),
                details: None,
            },
            CoreError::SaveInFlight => HandlerErr {
                code: "save_in_flight",
                message: e.to_string(),
                details: None,
            },
            CoreError::Db(source) => HandlerErr {
                code: db_code,
                message: source.to_string(),
                details: None,
            },
        }
    }
}
