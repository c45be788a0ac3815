use crate::auth::Role;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    db_query_failed, get_optional_str, get_required_date, get_required_str, require_role,
    require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension};
use serde_json::json;

const STATUS_PENDING: &str = "Pending";
const STATUS_APPROVED: &str = "Approved";
const STATUS_REJECTED: &str = "Rejected";

fn parse_decision(raw: &str) -> Result<&'static str, HandlerErr> {
    if raw.trim().eq_ignore_ascii_case(STATUS_APPROVED) {
        Ok(STATUS_APPROVED)
    } else if raw.trim().eq_ignore_ascii_case(STATUS_REJECTED) {
        Ok(STATUS_REJECTED)
    } else {
        Err(HandlerErr::new(
            "bad_params",
            "decision must be Approved or Rejected",
        ))
    }
}

fn valid_status_filter(raw: &str) -> bool {
    matches!(raw, STATUS_PENDING | STATUS_APPROVED | STATUS_REJECTED)
}

fn next_application_id(conn: &Connection) -> Result<String, HandlerErr> {
    // Applications are never deleted, so the row count is the high-water mark.
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM leave_applications", [], |r| r.get(0))
        .map_err(db_query_failed)?;
    Ok(format!("LA{:03}", count + 1))
}

fn application_json(
    id: &str,
    student_id: &str,
    from_date: &str,
    to_date: &str,
    reason: &str,
    status: &str,
    applied_to: &str,
    applied_date: &str,
) -> serde_json::Value {
    json!({
        "id": id,
        "studentId": student_id,
        "fromDate": from_date,
        "toDate": to_date,
        "reason": reason,
        "status": status,
        "appliedTo": applied_to,
        "appliedDate": applied_date,
    })
}

fn submit(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = require_role(state, params, &[Role::Student])?;
    let from_date = get_required_date(params, "fromDate")?;
    let to_date = get_required_date(params, "toDate")?;
    let reason = get_required_str(params, "reason")?;
    let applied_to = get_required_str(params, "appliedTo")?;

    if from_date > to_date {
        return Err(HandlerErr::new(
            "invalid_range",
            "fromDate must not be after toDate",
        ));
    }
    let reason = reason.trim().to_string();
    if reason.is_empty() {
        return Err(HandlerErr::new("missing_reason", "reason must not be empty"));
    }
    let applied_to = applied_to.trim().to_string();
    if applied_to.is_empty() {
        return Err(HandlerErr::new("bad_params", "appliedTo must not be empty"));
    }

    let id = next_application_id(&state.conn)?;
    let from_str = from_date.format("%Y-%m-%d").to_string();
    let to_str = to_date.format("%Y-%m-%d").to_string();
    let applied_date = chrono::Local::now().date_naive().format("%Y-%m-%d").to_string();
    state
        .conn
        .execute(
            "INSERT INTO leave_applications(
                 id, student_id, from_date, to_date, reason, status, applied_to, applied_date)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &id,
                &session.user_id,
                &from_str,
                &to_str,
                &reason,
                STATUS_PENDING,
                &applied_to,
                &applied_date,
            ),
        )
        .map_err(|e| HandlerErr {
            code: "db_insert_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "leave_applications" })),
        })?;

    tracing::info!(id = %id, student = %session.user_id, "leave application submitted");
    Ok(json!({
        "application": application_json(
            &id,
            &session.user_id,
            &from_str,
            &to_str,
            &reason,
            STATUS_PENDING,
            &applied_to,
            &applied_date,
        )
    }))
}

fn decide(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = require_role(state, params, &[Role::Admin, Role::Faculty])?;
    let application_id = get_required_str(params, "applicationId")?;
    let decision = parse_decision(&get_required_str(params, "decision")?)?;

    let applied_to: Option<String> = state
        .conn
        .query_row(
            "SELECT applied_to FROM leave_applications WHERE id = ?",
            [application_id.trim()],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_query_failed)?;

    let Some(applied_to) = applied_to else {
        return Err(HandlerErr::new("not_found", "no such application"));
    };

    // Faculty only decide applications addressed to them; admin decides any.
    if session.role == Role::Faculty && applied_to != session.user_id {
        return Err(HandlerErr::new(
            "role_not_permitted",
            "application is assigned to another reviewer",
        ));
    }

    // Compare-and-set: the Pending -> terminal transition happens exactly once.
    let updated = state
        .conn
        .execute(
            "UPDATE leave_applications SET status = ?
             WHERE id = ? AND status = ?",
            (decision, application_id.trim(), STATUS_PENDING),
        )
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if updated == 0 {
        return Err(HandlerErr::new(
            "already_decided",
            "application is no longer pending",
        ));
    }

    tracing::info!(id = %application_id.trim(), decision, reviewer = %session.user_id, "leave decided");
    Ok(json!({ "ok": true }))
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = require_session(state, params)?;
    let status_filter = match get_optional_str(params, "status")? {
        Some(raw) => {
            let trimmed = raw.trim().to_string();
            if !valid_status_filter(&trimmed) {
                return Err(HandlerErr::new(
                    "bad_params",
                    "status must be Pending, Approved or Rejected",
                ));
            }
            Some(trimmed)
        }
        None => None,
    };

    // Visibility: students see what they submitted, faculty what is addressed
    // to them (exact id match), admin everything.
    let (scope_sql, scope_value) = match session.role {
        Role::Student => (" AND student_id = ?", Some(session.user_id.clone())),
        Role::Faculty => (" AND applied_to = ?", Some(session.user_id.clone())),
        Role::Admin => ("", None),
    };

    let mut sql = String::from(
        "SELECT id, student_id, from_date, to_date, reason, status, applied_to, applied_date
         FROM leave_applications WHERE 1=1",
    );
    sql.push_str(scope_sql);
    let mut values: Vec<Value> = Vec::new();
    if let Some(v) = scope_value {
        values.push(Value::Text(v));
    }
    if let Some(status) = status_filter {
        sql.push_str(" AND status = ?");
        values.push(Value::Text(status));
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = state.conn.prepare(&sql).map_err(db_query_failed)?;
    let applications = stmt
        .query_map(params_from_iter(values), |r| {
            Ok(application_json(
                &r.get::<_, String>(0)?,
                &r.get::<_, String>(1)?,
                &r.get::<_, String>(2)?,
                &r.get::<_, String>(3)?,
                &r.get::<_, String>(4)?,
                &r.get::<_, String>(5)?,
                &r.get::<_, String>(6)?,
                &r.get::<_, String>(7)?,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;

    Ok(json!({ "applications": applications }))
}

fn respond(
    state: &mut AppState,
    req: &Request,
    f: fn(&AppState, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match f(state, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "leave.submit" => Some(respond(state, req, submit)),
        "leave.decide" => Some(respond(state, req, decide)),
        "leave.list" => Some(respond(state, req, list)),
        _ => None,
    }
}
