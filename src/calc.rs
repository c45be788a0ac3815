use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;

/// Students below this attendance percentage are flagged at risk.
pub const RISK_THRESHOLD_PERCENT: f64 = 75.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
        }
    }

    pub fn parse(s: &str) -> Option<AttendanceStatus> {
        if s.trim().eq_ignore_ascii_case("present") {
            Some(AttendanceStatus::Present)
        } else if s.trim().eq_ignore_ascii_case("absent") {
            Some(AttendanceStatus::Absent)
        } else {
            None
        }
    }
}

/// present / total * 100. An empty partition is a 0% rate, not an error.
pub fn attendance_rate(present: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * (present as f64) / (total as f64)
    }
}

/// Smallest n with (present + n) / (total + n) >= 75%, i.e.
/// ceil((0.75 * total - present) / 0.25), clamped at zero.
pub fn classes_to_recover(present: usize, total: usize) -> u64 {
    let threshold = RISK_THRESHOLD_PERCENT / 100.0;
    let shortfall = threshold * (total as f64) - (present as f64);
    if shortfall <= 0.0 {
        return 0;
    }
    (shortfall / (1.0 - threshold)).ceil() as u64
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StudentSummary {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
    pub percentage: f64,
    pub at_risk: bool,
    pub classes_to_recover: u64,
}

pub fn summarize(present: usize, total: usize) -> StudentSummary {
    let percentage = attendance_rate(present, total);
    StudentSummary {
        present,
        absent: total - present,
        total,
        percentage,
        at_risk: percentage < RISK_THRESHOLD_PERCENT,
        classes_to_recover: classes_to_recover(present, total),
    }
}

/// Monday of the calendar week containing `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Groups (date, present) observations by calendar week and computes the rate
/// per week, ascending by week start.
pub fn weekly_rates<I>(records: I) -> Vec<(NaiveDate, f64)>
where
    I: IntoIterator<Item = (NaiveDate, bool)>,
{
    let mut buckets: BTreeMap<NaiveDate, (usize, usize)> = BTreeMap::new();
    for (date, present) in records {
        let entry = buckets.entry(week_start(date)).or_insert((0, 0));
        if present {
            entry.0 += 1;
        }
        entry.1 += 1;
    }
    buckets
        .into_iter()
        .map(|(week, (present, total))| (week, attendance_rate(present, total)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).expect("valid date")
    }

    #[test]
    fn rate_of_empty_partition_is_zero() {
        assert_eq!(attendance_rate(0, 0), 0.0);
    }

    #[test]
    fn rate_is_exact_ratio_within_bounds() {
        assert_eq!(attendance_rate(3, 4), 75.0);
        assert_eq!(attendance_rate(0, 5), 0.0);
        assert_eq!(attendance_rate(5, 5), 100.0);
        for present in 0..=10 {
            let r = attendance_rate(present, 10);
            assert!((0.0..=100.0).contains(&r));
        }
    }

    #[test]
    fn recovery_projection_clamps_at_zero() {
        // Already at or above 75%.
        assert_eq!(classes_to_recover(3, 4), 0);
        assert_eq!(classes_to_recover(10, 10), 0);
        assert_eq!(classes_to_recover(0, 0), 0);
    }

    #[test]
    fn recovery_projection_reaches_threshold() {
        // 2/4 = 50%: four more attended classes gives 6/8 = 75%.
        assert_eq!(classes_to_recover(2, 4), 4);
        // 7/10 = 70%: two more gives 9/12 = 75%.
        assert_eq!(classes_to_recover(7, 10), 2);
        for (present, total) in [(2usize, 4usize), (7, 10), (1, 2), (0, 3), (15, 23)] {
            let n = classes_to_recover(present, total);
            assert!(attendance_rate(present + n as usize, total + n as usize) >= 75.0);
            if n > 0 {
                let short = n as usize - 1;
                assert!(attendance_rate(present + short, total + short) < 75.0);
            }
        }
    }

    #[test]
    fn summary_flags_risk_below_threshold() {
        let s = summarize(2, 4);
        assert_eq!(s.absent, 2);
        assert!(s.at_risk);
        assert_eq!(s.classes_to_recover, 4);

        let ok = summarize(3, 4);
        assert!(!ok.at_risk);
        assert_eq!(ok.classes_to_recover, 0);
    }

    #[test]
    fn week_start_is_monday() {
        // 2024-01-01 is a Monday.
        assert_eq!(week_start(d(2024, 1, 1)), d(2024, 1, 1));
        assert_eq!(week_start(d(2024, 1, 3)), d(2024, 1, 1));
        assert_eq!(week_start(d(2024, 1, 7)), d(2024, 1, 1));
        assert_eq!(week_start(d(2024, 1, 8)), d(2024, 1, 8));
    }

    #[test]
    fn weekly_rates_group_by_calendar_week() {
        let records = vec![
            (d(2024, 1, 1), true),
            (d(2024, 1, 2), true),
            (d(2024, 1, 3), false),
            (d(2024, 1, 4), true),
            (d(2024, 1, 8), false),
            (d(2024, 1, 9), false),
        ];
        let series = weekly_rates(records);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].0, d(2024, 1, 1));
        assert_eq!(series[0].1, 75.0);
        assert_eq!(series[1].0, d(2024, 1, 8));
        assert_eq!(series[1].1, 0.0);
    }

    #[test]
    fn status_parsing_is_case_insensitive() {
        assert_eq!(
            AttendanceStatus::parse("present"),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(
            AttendanceStatus::parse(" Absent "),
            Some(AttendanceStatus::Absent)
        );
        assert_eq!(AttendanceStatus::parse("late"), None);
    }
}
