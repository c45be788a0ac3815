use crate::auth::Role;
use crate::calc::{self, AttendanceStatus};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    db_query_failed, get_optional_date, get_optional_str, get_required_date, get_required_str,
    require_role, require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request, Session};
use chrono::NaiveDate;
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;

fn get_status(params: &serde_json::Value, key: &str) -> Result<AttendanceStatus, HandlerErr> {
    let raw = get_required_str(params, key)?;
    AttendanceStatus::parse(&raw).ok_or_else(|| {
        HandlerErr::new(
            "bad_params",
            format!("{} must be Present or Absent", key),
        )
    })
}

/// Students may only look at their own records; staff may look at anyone's.
fn resolve_student_scope(
    session: &Session,
    requested: Option<String>,
) -> Result<Option<String>, HandlerErr> {
    if session.role != Role::Student {
        return Ok(requested);
    }
    match requested {
        None => Ok(Some(session.user_id.clone())),
        Some(id) if id == session.user_id => Ok(Some(id)),
        Some(_) => Err(HandlerErr::new(
            "role_not_permitted",
            "students may only view their own attendance",
        )),
    }
}

fn mark(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, params, &[Role::Admin, Role::Faculty])?;
    let student_id = get_required_str(params, "studentId")?;
    let date = get_required_date(params, "date")?;
    let status = get_status(params, "status")?;
    let class_id = get_required_str(params, "classId")?;
    if student_id.trim().is_empty() || class_id.trim().is_empty() {
        return Err(HandlerErr::new(
            "bad_params",
            "studentId and classId must not be empty",
        ));
    }

    state
        .conn
        .execute(
            "INSERT INTO attendance(student_id, date, status, class_id)
             VALUES(?, ?, ?, ?)
             ON CONFLICT(student_id, date, class_id) DO UPDATE SET
               status = excluded.status",
            (
                student_id.trim(),
                date.format("%Y-%m-%d").to_string(),
                status.as_str(),
                class_id.trim(),
            ),
        )
        .map_err(|e| HandlerErr {
            code: "db_update_failed",
            message: e.to_string(),
            details: Some(json!({ "table": "attendance" })),
        })?;
    Ok(json!({ "ok": true }))
}

fn edit(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, params, &[Role::Admin, Role::Faculty])?;
    let student_id = get_required_str(params, "studentId")?;
    let date = get_required_date(params, "date")?;
    let new_status = get_status(params, "newStatus")?;
    let class_id = get_optional_str(params, "classId")?;

    // Without a classId this touches every class slot the student has on that
    // date; the caller sees how many rows moved.
    let date_str = date.format("%Y-%m-%d").to_string();
    let updated = match class_id {
        Some(class_id) => state
            .conn
            .execute(
                "UPDATE attendance SET status = ?
                 WHERE student_id = ? AND date = ? AND class_id = ?",
                (new_status.as_str(), student_id.trim(), &date_str, class_id.trim()),
            )
            .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?,
        None => state
            .conn
            .execute(
                "UPDATE attendance SET status = ?
                 WHERE student_id = ? AND date = ?",
                (new_status.as_str(), student_id.trim(), &date_str),
            )
            .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?,
    };

    if updated == 0 {
        return Err(HandlerErr::new(
            "not_found",
            "no attendance record for that student and date",
        ));
    }
    Ok(json!({ "updated": updated }))
}

struct ListFilter {
    student_id: Option<String>,
    class_id: Option<String>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
}

fn list_records(
    conn: &Connection,
    filter: &ListFilter,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut sql = String::from(
        "SELECT student_id, date, status, class_id FROM attendance WHERE 1=1",
    );
    let mut values: Vec<Value> = Vec::new();
    if let Some(student_id) = &filter.student_id {
        sql.push_str(" AND student_id = ?");
        values.push(Value::Text(student_id.clone()));
    }
    if let Some(class_id) = &filter.class_id {
        sql.push_str(" AND class_id = ?");
        values.push(Value::Text(class_id.clone()));
    }
    if let Some(from) = filter.from {
        sql.push_str(" AND date >= ?");
        values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = filter.to {
        sql.push_str(" AND date <= ?");
        values.push(Value::Text(to.format("%Y-%m-%d").to_string()));
    }
    sql.push_str(" ORDER BY date, student_id, class_id");

    let mut stmt = conn.prepare(&sql).map_err(db_query_failed)?;
    stmt.query_map(params_from_iter(values), |r| {
        Ok(json!({
            "studentId": r.get::<_, String>(0)?,
            "date": r.get::<_, String>(1)?,
            "status": r.get::<_, String>(2)?,
            "classId": r.get::<_, String>(3)?,
        }))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(db_query_failed)
}

fn list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session = require_session(state, params)?;
    let student_id = resolve_student_scope(session, get_optional_str(params, "studentId")?)?;
    let filter = ListFilter {
        student_id,
        class_id: get_optional_str(params, "classId")?,
        from: get_optional_date(params, "from")?,
        to: get_optional_date(params, "to")?,
    };
    let records = list_records(&state.conn, &filter)?;
    Ok(json!({ "records": records }))
}

fn student_counts(
    conn: &Connection,
    student_id: &str,
) -> Result<(usize, usize), HandlerErr> {
    conn.query_row(
        "SELECT
           COALESCE(SUM(CASE WHEN status = 'Present' THEN 1 ELSE 0 END), 0),
           COUNT(*)
         FROM attendance
         WHERE student_id = ?",
        [student_id],
        |r| Ok((r.get::<_, i64>(0)? as usize, r.get::<_, i64>(1)? as usize)),
    )
    .map_err(db_query_failed)
}

fn student_summary(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session = require_session(state, params)?;
    let student_id = resolve_student_scope(session, get_optional_str(params, "studentId")?)?
        .ok_or_else(|| HandlerErr::new("bad_params", "missing studentId"))?;

    let (present, total) = student_counts(&state.conn, &student_id)?;
    let summary = calc::summarize(present, total);
    Ok(json!({
        "studentId": student_id,
        "total": summary.total,
        "present": summary.present,
        "absent": summary.absent,
        "percentage": summary.percentage,
        "atRisk": summary.at_risk,
        "classesToRecover": summary.classes_to_recover,
    }))
}

fn weekly_series(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let session = require_session(state, params)?;
    let student_id = resolve_student_scope(session, get_optional_str(params, "studentId")?)?
        .ok_or_else(|| HandlerErr::new("bad_params", "missing studentId"))?;

    let mut stmt = state
        .conn
        .prepare(
            "SELECT date, status FROM attendance WHERE student_id = ? ORDER BY date",
        )
        .map_err(db_query_failed)?;
    let rows = stmt
        .query_map([&student_id], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;

    let mut observations = Vec::with_capacity(rows.len());
    for (date, status) in rows {
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .map_err(|_| HandlerErr::new("db_query_failed", "malformed date in store"))?;
        observations.push((date, status == "Present"));
    }

    let series: Vec<serde_json::Value> = calc::weekly_rates(observations)
        .into_iter()
        .map(|(week_start, rate)| {
            json!({
                "weekStart": week_start.format("%Y-%m-%d").to_string(),
                "rate": rate,
            })
        })
        .collect();
    Ok(json!({ "studentId": student_id, "series": series }))
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
        "attendance.mark" => Some(respond(state, req, mark)),
        "attendance.edit" => Some(respond(state, req, edit)),
        "attendance.list" => Some(respond(state, req, list)),
        "attendance.studentSummary" => Some(respond(state, req, student_summary)),
        "attendance.weeklySeries" => Some(respond(state, req, weekly_series)),
        _ => None,
    }
}
