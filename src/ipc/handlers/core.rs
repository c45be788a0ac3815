use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let students: Result<i64, _> = state.conn.query_row(
        "SELECT COUNT(DISTINCT student_id) FROM attendance",
        [],
        |r| r.get(0),
    );
    match students {
        Ok(students) => ok(
            &req.id,
            json!({
                "version": env!("CARGO_PKG_VERSION"),
                "students": students,
                "authenticated": state.session.is_some()
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        _ => None,
    }
}
