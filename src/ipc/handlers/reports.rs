use crate::auth::Role;
use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    db_query_failed, get_optional_date, get_optional_str, get_required_date, get_required_str,
    require_role, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use chrono::NaiveDate;
use rusqlite::{params_from_iter, types::Value, Connection};
use serde_json::json;

/// Admin landing metrics: roster size, class count, overall rate, queue depth.
fn overview(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, params, &[Role::Admin])?;

    let (total_students, total_classes, present, total) = state
        .conn
        .query_row(
            "SELECT
               COUNT(DISTINCT student_id),
               COUNT(DISTINCT class_id),
               COALESCE(SUM(CASE WHEN status = 'Present' THEN 1 ELSE 0 END), 0),
               COUNT(*)
             FROM attendance",
            [],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)? as usize,
                    r.get::<_, i64>(3)? as usize,
                ))
            },
        )
        .map_err(db_query_failed)?;

    let pending_leaves: i64 = state
        .conn
        .query_row(
            "SELECT COUNT(*) FROM leave_applications WHERE status = 'Pending'",
            [],
            |r| r.get(0),
        )
        .map_err(db_query_failed)?;

    Ok(json!({
        "totalStudents": total_students,
        "totalClasses": total_classes,
        "averageAttendance": calc::attendance_rate(present, total),
        "pendingLeaves": pending_leaves,
    }))
}

fn partition_counts(
    conn: &Connection,
    date: Option<NaiveDate>,
    class_id: Option<&str>,
) -> Result<(usize, usize), HandlerErr> {
    let mut sql = String::from(
        "SELECT
           COALESCE(SUM(CASE WHEN status = 'Present' THEN 1 ELSE 0 END), 0),
           COUNT(*)
         FROM attendance WHERE 1=1",
    );
    let mut values: Vec<Value> = Vec::new();
    if let Some(date) = date {
        sql.push_str(" AND date = ?");
        values.push(Value::Text(date.format("%Y-%m-%d").to_string()));
    }
    if let Some(class_id) = class_id {
        sql.push_str(" AND class_id = ?");
        values.push(Value::Text(class_id.to_string()));
    }

    let mut stmt = conn.prepare(&sql).map_err(db_query_failed)?;
    stmt.query_row(params_from_iter(values), |r| {
        Ok((r.get::<_, i64>(0)? as usize, r.get::<_, i64>(1)? as usize))
    })
    .map_err(db_query_failed)
}

/// Rate for one calendar day, optionally narrowed to a class. Empty day = 0.
fn daily_rate(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, params, &[Role::Admin, Role::Faculty])?;
    let date = get_required_date(params, "date")?;
    let class_id = get_optional_str(params, "classId")?;

    let (present, total) = partition_counts(&state.conn, Some(date), class_id.as_deref())?;
    Ok(json!({
        "date": date.format("%Y-%m-%d").to_string(),
        "rate": calc::attendance_rate(present, total),
    }))
}

fn daily_trend(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, params, &[Role::Admin, Role::Faculty])?;
    let class_id = get_optional_str(params, "classId")?;
    let from = get_optional_date(params, "from")?;
    let to = get_optional_date(params, "to")?;

    let mut sql = String::from(
        "SELECT
           date,
           SUM(CASE WHEN status = 'Present' THEN 1 ELSE 0 END),
           COUNT(*)
         FROM attendance WHERE 1=1",
    );
    let mut values: Vec<Value> = Vec::new();
    if let Some(class_id) = &class_id {
        sql.push_str(" AND class_id = ?");
        values.push(Value::Text(class_id.clone()));
    }
    if let Some(from) = from {
        sql.push_str(" AND date >= ?");
        values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = to {
        sql.push_str(" AND date <= ?");
        values.push(Value::Text(to.format("%Y-%m-%d").to_string()));
    }
    sql.push_str(" GROUP BY date ORDER BY date");

    let mut stmt = state.conn.prepare(&sql).map_err(db_query_failed)?;
    let series = stmt
        .query_map(params_from_iter(values), |r| {
            let date: String = r.get(0)?;
            let present: i64 = r.get(1)?;
            let total: i64 = r.get(2)?;
            Ok(json!({
                "date": date,
                "rate": calc::attendance_rate(present as usize, total as usize),
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;

    Ok(json!({ "series": series }))
}

/// Per-student breakdown for one class, with the below-threshold roll-up the
/// faculty view shows above the table.
fn class_report(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_role(state, params, &[Role::Admin, Role::Faculty])?;
    let class_id = get_required_str(params, "classId")?;
    let from = get_optional_date(params, "from")?;
    let to = get_optional_date(params, "to")?;

    let mut sql = String::from(
        "SELECT
           student_id,
           SUM(CASE WHEN status = 'Present' THEN 1 ELSE 0 END),
           COUNT(*)
         FROM attendance WHERE class_id = ?",
    );
    let mut values: Vec<Value> = vec![Value::Text(class_id.clone())];
    if let Some(from) = from {
        sql.push_str(" AND date >= ?");
        values.push(Value::Text(from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = to {
        sql.push_str(" AND date <= ?");
        values.push(Value::Text(to.format("%Y-%m-%d").to_string()));
    }
    sql.push_str(" GROUP BY student_id ORDER BY student_id");

    let mut stmt = state.conn.prepare(&sql).map_err(db_query_failed)?;
    let per_student = stmt
        .query_map(params_from_iter(values), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, i64>(1)? as usize,
                r.get::<_, i64>(2)? as usize,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(db_query_failed)?;

    let mut below_threshold = 0i64;
    let mut class_present = 0usize;
    let mut class_total = 0usize;
    let rows: Vec<serde_json::Value> = per_student
        .into_iter()
        .map(|(student_id, present, total)| {
            let summary = calc::summarize(present, total);
            if summary.at_risk {
                below_threshold += 1;
            }
            class_present += present;
            class_total += total;
            json!({
                "studentId": student_id,
                "present": summary.present,
                "absent": summary.absent,
                "total": summary.total,
                "percentage": summary.percentage,
                "atRisk": summary.at_risk,
            })
        })
        .collect();

    Ok(json!({
        "classId": class_id,
        "totalStudents": rows.len(),
        "averageAttendance": calc::attendance_rate(class_present, class_total),
        "belowThreshold": below_threshold,
        "rows": rows,
    }))
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
        "reports.overview" => Some(respond(state, req, overview)),
        "reports.dailyRate" => Some(respond(state, req, daily_rate)),
        "reports.dailyTrend" => Some(respond(state, req, daily_trend)),
        "reports.classReport" => Some(respond(state, req, class_report)),
        _ => None,
    }
}
