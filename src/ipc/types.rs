use std::collections::HashMap;
use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::editor::EditorSession;
use crate::notify::ChangeBus;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// One attendance editing surface per course, keyed by course id.
    pub sessions: HashMap<String, EditorSession>,
    pub bus: ChangeBus,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            workspace: None,
            db: None,
            sessions: HashMap::new(),
            bus: ChangeBus::new(),
        }
    }
}
