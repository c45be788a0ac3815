use rusqlite::Connection;
use serde::Deserialize;

use crate::auth::Role;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The authenticated user, if any. One session per process, matching the
/// single-front-end model: login replaces it, logout clears it.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub role: Role,
    pub display_name: String,
}

/// Login-gate state: the single active CAPTCHA challenge and the consecutive
/// failure counter. Reset on logout and on process start.
pub struct GateState {
    pub challenge: Option<String>,
    pub failed_attempts: u32,
    pub rng: fastrand::Rng,
}

impl GateState {
    pub fn new() -> Self {
        GateState {
            challenge: None,
            failed_attempts: 0,
            rng: fastrand::Rng::new(),
        }
    }
}

pub struct AppState {
    pub conn: Connection,
    pub gate: GateState,
    pub session: Option<Session>,
}
