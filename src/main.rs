mod auth;
mod calc;
mod db;
mod ipc;
mod seed;

use std::io::{self, BufRead, Write};

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    // stdout carries the JSON protocol; all diagnostics go to stderr.
    let env_filter =
        EnvFilter::try_from_env("ATTENDD_LOG").unwrap_or_else(|_| EnvFilter::new("attendd=info"));
    fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();

    let conn = db::open_memory_db()?;
    let summary = seed::seed_demo_data(&conn)?;
    tracing::info!(
        credentials = summary.credentials,
        attendance_records = summary.attendance_records,
        "store seeded"
    );

    let mut state = ipc::AppState {
        conn,
        gate: ipc::GateState::new(),
        session: None,
    };

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; ignore.
                let _ = writeln!(
                    stdout,
                    "{{\"ok\":false,\"error\":{{\"code\":\"bad_json\",\"message\":\"{}\"}}}}",
                    e
                );
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    Ok(())
}
