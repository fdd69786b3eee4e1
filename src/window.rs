use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::NudgeError;
use crate::models::Assignment;

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Parses an ISO-8601 timestamp into UTC. Values without an offset are taken
/// to be UTC already; a bare date means midnight.
pub fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, NudgeError> {
    let value = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Some(midnight) = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }

    Err(NudgeError::MalformedTimestamp {
        field,
        value: raw.to_string(),
    })
}

/// Inclusive range of due dates a report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start > end {
            warn!(%start, %end, "report window starts after it ends; no assignment will match");
        }
        Self { start, end }
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, NudgeError> {
        Ok(Self::new(
            parse_timestamp("window start", start)?,
            parse_timestamp("window end", end)?,
        ))
    }

    pub fn last_week(now: DateTime<Utc>) -> Self {
        Self::new(now - Duration::days(7), now)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Keeps the assignments due inside `window`, in their original order.
/// Assignments without a due date never match; an unparseable one aborts the
/// whole filter.
pub fn filter_by_due_date(
    assignments: &[Assignment],
    window: &ReportWindow,
) -> Result<Vec<Assignment>, NudgeError> {
    let mut filtered = Vec::new();

    for assignment in assignments {
        let due_at = match assignment.due_at.as_deref() {
            Some(value) if !value.trim().is_empty() => value,
            _ => continue,
        };

        if window.contains(parse_timestamp("due_at", due_at)?) {
            filtered.push(assignment.clone());
        }
    }

    Ok(filtered)
}

/// True once `now` is strictly past the assignment's lock date. A lock date
/// that cannot be parsed counts as not expired.
pub fn is_expired(assignment: &Assignment, now: DateTime<Utc>) -> bool {
    let Some(lock_at) = assignment.lock_at.as_deref() else {
        return false;
    };

    match parse_timestamp("lock_at", lock_at) {
        Ok(lock) => now > lock,
        Err(err) => {
            warn!(assignment = %assignment.id, "treating assignment as open: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn assignment(id: &str, due_at: Option<&str>, lock_at: Option<&str>) -> Assignment {
        Assignment {
            id: id.into(),
            name: format!("Assignment {id}"),
            due_at: due_at.map(str::to_string),
            lock_at: lock_at.map(str::to_string),
        }
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn parses_offsets_zulu_naive_and_dates() {
        let expected = utc(2024, 1, 8, 10, 0);
        assert_eq!(parse_timestamp("t", "2024-01-08T10:00:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("t", "2024-01-08T10:00:00+00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("t", "2024-01-08T05:00:00-05:00").unwrap(), expected);
        assert_eq!(parse_timestamp("t", "2024-01-08T10:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("t", "2024-01-08 10:00:00").unwrap(), expected);
        assert_eq!(parse_timestamp("t", "2024-01-08T10:00").unwrap(), expected);
        assert_eq!(parse_timestamp("t", "2024-01-08").unwrap(), utc(2024, 1, 8, 0, 0));
    }

    #[test]
    fn rejects_garbage_timestamps() {
        let err = parse_timestamp("due_at", "next tuesday").unwrap_err();
        assert!(matches!(
            err,
            NudgeError::MalformedTimestamp { field: "due_at", .. }
        ));
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = ReportWindow::parse("2024-01-08T00:00:00", "2024-01-14T23:59:00").unwrap();
        let assignments = vec![
            assignment("start", Some("2024-01-08T00:00:00Z"), None),
            assignment("end", Some("2024-01-14T23:59:00Z"), None),
            assignment("before", Some("2024-01-07T00:00:00Z"), None),
            assignment("after", Some("2024-01-15T23:59:00Z"), None),
            assignment("undated", None, None),
        ];

        let filtered = filter_by_due_date(&assignments, &window).unwrap();
        let ids: Vec<&str> = filtered.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["start", "end"]);
    }

    #[test]
    fn naive_and_explicit_utc_bounds_agree() {
        let assignments = vec![
            assignment("a", Some("2024-01-08T10:00:00Z"), None),
            assignment("b", Some("2024-01-14T23:59:00"), None),
            assignment("c", Some("2024-01-20T00:00:00Z"), None),
        ];
        let naive = ReportWindow::parse("2024-01-08T00:00:00", "2024-01-14T23:59:00").unwrap();
        let explicit =
            ReportWindow::parse("2024-01-08T00:00:00Z", "2024-01-14T23:59:00+00:00").unwrap();

        assert_eq!(naive, explicit);
        assert_eq!(
            filter_by_due_date(&assignments, &naive).unwrap(),
            filter_by_due_date(&assignments, &explicit).unwrap()
        );
    }

    #[test]
    fn malformed_due_date_aborts_filter() {
        let window = ReportWindow::last_week(utc(2024, 1, 14, 0, 0));
        let assignments = vec![assignment("bad", Some("soon"), None)];
        assert!(filter_by_due_date(&assignments, &window).is_err());
    }

    #[test]
    fn inverted_window_selects_nothing() {
        let window = ReportWindow::new(utc(2024, 1, 14, 0, 0), utc(2024, 1, 8, 0, 0));
        let assignments = vec![assignment("a", Some("2024-01-10T00:00:00Z"), None)];
        assert!(filter_by_due_date(&assignments, &window).unwrap().is_empty());
    }

    #[test]
    fn last_week_spans_seven_days() {
        let now = utc(2024, 1, 14, 12, 0);
        let window = ReportWindow::last_week(now);
        assert_eq!(window.start, utc(2024, 1, 7, 12, 0));
        assert_eq!(window.end, now);
    }

    #[test]
    fn expiry_requires_now_strictly_after_lock() {
        let lock = "2024-01-09T00:00:00Z";
        let a = assignment("a", None, Some(lock));
        assert!(!is_expired(&a, utc(2024, 1, 9, 0, 0)));
        assert!(is_expired(&a, utc(2024, 1, 9, 0, 1)));
        assert!(!is_expired(&assignment("open", None, None), utc(2030, 1, 1, 0, 0)));
    }

    #[test]
    fn unparseable_lock_date_is_not_expired() {
        let a = assignment("a", None, Some("whenever"));
        assert!(!is_expired(&a, utc(2030, 1, 1, 0, 0)));
    }
}
