use crate::auth;
use chrono::{Datelike, NaiveDate, Weekday};
use rusqlite::Connection;

/// Fixed seed so every process start produces the identical demo store.
const DEMO_SEED: u64 = 20240101;

const DEMO_CLASSES: [&str; 3] = ["Class A", "Class B", "Class C"];
const DEMO_STUDENT_COUNT: u32 = 20;

/// (login_id, password, role, display_name)
const DEMO_USERS: [(&str, &str, &str, &str); 6] = [
    ("admin001", "admin123", "admin", "Admin User"),
    ("FAC001", "faculty123", "faculty", "Dr. Smith"),
    ("FAC002", "faculty123", "faculty", "Prof. Johnson"),
    ("STU001", "student123", "student", "John Doe"),
    ("STU002", "student123", "student", "Jane Smith"),
    ("STU003", "student123", "student", "Bob Wilson"),
];

#[derive(Debug, Clone, Copy)]
pub struct SeedSummary {
    pub credentials: usize,
    pub attendance_records: usize,
}

/// Seeds credentials plus synthetic attendance: 20 students, the weekdays of
/// January 2024, 75% Present / 25% Absent, class uniform over A/B/C.
pub fn seed_demo_data(conn: &Connection) -> anyhow::Result<SeedSummary> {
    let mut rng = fastrand::Rng::with_seed(DEMO_SEED);

    let tx = conn.unchecked_transaction()?;

    for (login_id, password, role, display_name) in DEMO_USERS {
        let salt = auth::generate_salt(&mut rng);
        let digest = auth::password_digest(&salt, password);
        tx.execute(
            "INSERT INTO credentials(login_id, salt, password_digest, role, display_name)
             VALUES(?, ?, ?, ?, ?)",
            (login_id, &salt, &digest, role, display_name),
        )?;
    }

    let mut attendance_records = 0usize;
    for n in 1..=DEMO_STUDENT_COUNT {
        let student_id = format!("STU{:03}", n);
        for day in 1..=31u32 {
            let Some(date) = NaiveDate::from_ymd_opt(2024, 1, day) else {
                continue;
            };
            if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                continue;
            }
            let status = if rng.u32(..4) < 3 { "Present" } else { "Absent" };
            let class_id = DEMO_CLASSES[rng.usize(..DEMO_CLASSES.len())];
            tx.execute(
                "INSERT INTO attendance(student_id, date, status, class_id)
                 VALUES(?, ?, ?, ?)",
                (&student_id, date.format("%Y-%m-%d").to_string(), status, class_id),
            )?;
            attendance_records += 1;
        }
    }

    tx.commit()?;

    Ok(SeedSummary {
        credentials: DEMO_USERS.len(),
        attendance_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn seed_is_deterministic_across_runs() {
        let snapshot = |conn: &Connection| -> Vec<(String, String, String, String)> {
            let mut stmt = conn
                .prepare(
                    "SELECT student_id, date, status, class_id
                     FROM attendance
                     ORDER BY student_id, date, class_id",
                )
                .expect("prepare");
            stmt.query_map([], |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?))
            })
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows")
        };

        let a = db::open_memory_db().expect("db a");
        let b = db::open_memory_db().expect("db b");
        seed_demo_data(&a).expect("seed a");
        seed_demo_data(&b).expect("seed b");
        assert_eq!(snapshot(&a), snapshot(&b));
    }

    #[test]
    fn seed_covers_every_weekday_of_january() {
        let conn = db::open_memory_db().expect("db");
        let summary = seed_demo_data(&conn).expect("seed");
        // January 2024 has 23 weekdays.
        assert_eq!(summary.attendance_records, 23 * 20);
        let distinct_dates: i64 = conn
            .query_row("SELECT COUNT(DISTINCT date) FROM attendance", [], |r| {
                r.get(0)
            })
            .expect("count");
        assert_eq!(distinct_dates, 23);
        let weekend_rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM attendance WHERE date IN ('2024-01-06','2024-01-07','2024-01-13','2024-01-14')",
                [],
                |r| r.get(0),
            )
            .expect("count");
        assert_eq!(weekend_rows, 0);
    }

    #[test]
    fn seeded_statuses_stay_near_three_quarters_present() {
        let conn = db::open_memory_db().expect("db");
        seed_demo_data(&conn).expect("seed");
        let present: f64 = conn
            .query_row(
                "SELECT AVG(CASE WHEN status = 'Present' THEN 1.0 ELSE 0.0 END) FROM attendance",
                [],
                |r| r.get(0),
            )
            .expect("avg");
        // 460 draws at p=0.75; anything outside this band means the draw is wrong.
        assert!((0.65..=0.85).contains(&present), "present share {}", present);
    }
}
