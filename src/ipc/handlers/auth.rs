use crate::auth;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request, Session};
use serde_json::json;
use uuid::Uuid;

/// Failures before the lockout warning starts appearing in error details.
const LOCKOUT_WARNING_AFTER: u32 = 3;

fn active_challenge(state: &mut AppState) -> String {
    match state.gate.challenge.clone() {
        Some(c) => c,
        None => rotate_challenge(state),
    }
}

fn rotate_challenge(state: &mut AppState) -> String {
    let fresh = auth::generate_challenge(&mut state.gate.rng);
    state.gate.challenge = Some(fresh.clone());
    fresh
}

fn gate_failure_details(state: &AppState) -> serde_json::Value {
    let mut details = json!({ "failedAttempts": state.gate.failed_attempts });
    if state.gate.failed_attempts >= LOCKOUT_WARNING_AFTER {
        details["lockoutWarning"] = json!(true);
    }
    details
}

fn handle_challenge(state: &mut AppState, req: &Request) -> serde_json::Value {
    let captcha = active_challenge(state);
    ok(&req.id, json!({ "captcha": captcha }))
}

fn handle_refresh_challenge(state: &mut AppState, req: &Request) -> serde_json::Value {
    let captcha = rotate_challenge(state);
    ok(&req.id, json!({ "captcha": captcha }))
}

fn login_params(params: &serde_json::Value) -> Result<(String, String, String), HandlerErr> {
    let login_id = get_required_str(params, "loginId")?;
    let password = get_required_str(params, "password")?;
    let captcha = get_required_str(params, "captcha")?;
    Ok((login_id.trim().to_string(), password, captcha))
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (login_id, password, captcha) = match login_params(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let active = active_challenge(state);
    if !auth::verify_challenge(&captcha, &active) {
        state.gate.failed_attempts += 1;
        rotate_challenge(state);
        tracing::warn!(login_id = %login_id, "login rejected: challenge mismatch");
        return err(
            &req.id,
            "bad_challenge",
            "challenge response does not match",
            Some(gate_failure_details(state)),
        );
    }

    let cred = match auth::find_credential(&state.conn, &login_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let Some(cred) = cred else {
        state.gate.failed_attempts += 1;
        rotate_challenge(state);
        tracing::warn!(login_id = %login_id, "login rejected: unknown user");
        return err(
            &req.id,
            "unknown_user",
            "no such login id",
            Some(gate_failure_details(state)),
        );
    };

    if !auth::verify_password(&cred, &password) {
        state.gate.failed_attempts += 1;
        rotate_challenge(state);
        tracing::warn!(login_id = %login_id, "login rejected: wrong password");
        return err(
            &req.id,
            "wrong_password",
            "password does not match",
            Some(gate_failure_details(state)),
        );
    }

    state.gate.failed_attempts = 0;
    state.gate.challenge = None;
    let session = Session {
        token: Uuid::new_v4().to_string(),
        user_id: cred.login_id.clone(),
        role: cred.role,
        display_name: cred.display_name.clone(),
    };
    let result = json!({
        "session": session.token,
        "userId": session.user_id,
        "role": session.role.as_str(),
        "displayName": session.display_name,
    });
    tracing::info!(user_id = %session.user_id, role = session.role.as_str(), "login ok");
    state.session = Some(session);
    ok(&req.id, result)
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let token = match get_required_str(&req.params, "session") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    match state.session.as_ref() {
        Some(session) if session.token == token => {
            tracing::info!(user_id = %session.user_id, "logout");
            state.session = None;
            state.gate.challenge = None;
            state.gate.failed_attempts = 0;
            ok(&req.id, json!({}))
        }
        _ => err(&req.id, "not_authenticated", "no such session", None),
    }
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.session.as_ref() {
        Some(session) => ok(
            &req.id,
            json!({
                "authenticated": true,
                "userId": session.user_id,
                "role": session.role.as_str(),
                "displayName": session.display_name,
            }),
        ),
        None => ok(&req.id, json!({ "authenticated": false })),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.challenge" => Some(handle_challenge(state, req)),
        "auth.refreshChallenge" => Some(handle_refresh_challenge(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        _ => None,
    }
}
