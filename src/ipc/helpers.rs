use chrono::NaiveDate;
use serde_json::json;

use super::error::err;
use super::types::{AppState, Session};
use crate::auth::Role;

/// Handler-internal failure, mapped to the protocol error envelope at the
/// dispatch boundary.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

pub fn get_optional_str(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::new("bad_params", format!("{} must be a string", key))),
    }
}

pub fn parse_date(key: &str, raw: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| HandlerErr::new("bad_params", format!("{} must be YYYY-MM-DD", key)))
}

pub fn get_required_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<NaiveDate, HandlerErr> {
    let raw = get_required_str(params, key)?;
    parse_date(key, &raw)
}

pub fn get_optional_date(
    params: &serde_json::Value,
    key: &str,
) -> Result<Option<NaiveDate>, HandlerErr> {
    match get_optional_str(params, key)? {
        None => Ok(None),
        Some(raw) => parse_date(key, &raw).map(Some),
    }
}

/// Resolves the session token in `params.session` against the active session.
pub fn require_session<'a>(
    state: &'a AppState,
    params: &serde_json::Value,
) -> Result<&'a Session, HandlerErr> {
    let token = get_required_str(params, "session")?;
    match state.session.as_ref() {
        Some(session) if session.token == token => Ok(session),
        _ => Err(HandlerErr::new("not_authenticated", "login required")),
    }
}

pub fn require_role<'a>(
    state: &'a AppState,
    params: &serde_json::Value,
    allowed: &[Role],
) -> Result<&'a Session, HandlerErr> {
    let session = require_session(state, params)?;
    if !allowed.contains(&session.role) {
        return Err(HandlerErr {
            code: "role_not_permitted",
            message: format!("{} role may not call this method", session.role.as_str()),
            details: Some(json!({ "role": session.role.as_str() })),
        });
    }
    Ok(session)
}

pub fn db_query_failed(e: rusqlite::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}
