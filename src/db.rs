use rusqlite::Connection;

/// Opens the in-memory store. Everything lives for the life of the process;
/// a restart reseeds from scratch.
pub fn open_memory_db() -> anyhow::Result<Connection> {
    let conn = Connection::open_in_memory()?;

    conn.execute(
        "CREATE TABLE credentials(
            login_id TEXT PRIMARY KEY,
            salt TEXT NOT NULL,
            password_digest TEXT NOT NULL,
            role TEXT NOT NULL,
            display_name TEXT NOT NULL
        )",
        [],
    )?;

    // One row per (student, date, class). Marking the same slot twice is an
    // upsert, so the key doubles as the duplicate guard.
    conn.execute(
        "CREATE TABLE attendance(
            student_id TEXT NOT NULL,
            date TEXT NOT NULL,
            status TEXT NOT NULL,
            class_id TEXT NOT NULL,
            PRIMARY KEY(student_id, date, class_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_attendance_class ON attendance(class_id)",
        [],
    )?;
    conn.execute("CREATE INDEX idx_attendance_date ON attendance(date)", [])?;

    conn.execute(
        "CREATE TABLE leave_applications(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            from_date TEXT NOT NULL,
            to_date TEXT NOT NULL,
            reason TEXT NOT NULL,
            status TEXT NOT NULL,
            applied_to TEXT NOT NULL,
            applied_date TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_leave_student ON leave_applications(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_leave_applied_to ON leave_applications(applied_to)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX idx_leave_status ON leave_applications(status)",
        [],
    )?;

    Ok(conn)
}
