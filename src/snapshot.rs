use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::NudgeError;
use crate::models::{Assignment, Course, EntityId, Student, Submission, WeeklyReport};
use crate::status::{build_weekly_status, DuplicatePolicy};
use crate::window::{filter_by_due_date, ReportWindow};

/// Everything the course-data fetcher pulled for one run, keyed by course id and,
/// for submissions, by assignment id within the course.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub courses: Vec<Course>,
    #[serde(default)]
    pub students: HashMap<EntityId, Vec<Student>>,
    #[serde(default)]
    pub assignments: HashMap<EntityId, Vec<Assignment>>,
    #[serde(default)]
    pub submissions: HashMap<EntityId, HashMap<EntityId, Vec<Submission>>>,
}

impl Snapshot {
    pub fn from_json(contents: &str) -> anyhow::Result<Self> {
        serde_json::from_str(contents).context("snapshot is not valid course data")
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_json(&contents)
    }

    /// Courses named in `ids`, in snapshot order. No ids means every course.
    pub fn select_courses(&self, ids: &[EntityId]) -> Result<Vec<Course>, NudgeError> {
        if let Some(unknown) = ids
            .iter()
            .find(|id| !self.courses.iter().any(|course| &course.id == *id))
        {
            return Err(NudgeError::MissingJoinKey {
                course_id: unknown.clone(),
                collection: "courses",
            });
        }

        Ok(self
            .courses
            .iter()
            .filter(|course| ids.is_empty() || ids.contains(&course.id))
            .cloned()
            .collect())
    }

    /// Narrows each selected course's assignments to the window, then joins
    /// rosters and submissions into the weekly report.
    pub fn build_report(
        &self,
        selected: &[Course],
        window: &ReportWindow,
        now: DateTime<Utc>,
        policy: DuplicatePolicy,
    ) -> Result<WeeklyReport, NudgeError> {
        let mut due_in_window = HashMap::with_capacity(selected.len());

        for course in selected {
            let all = self
                .assignments
                .get(&course.id)
                .ok_or_else(|| NudgeError::MissingJoinKey {
                    course_id: course.id.clone(),
                    collection: "assignments",
                })?;
            let filtered = filter_by_due_date(all, window)?;
            debug!(
                course = %course.id,
                total = all.len(),
                in_window = filtered.len(),
                "filtered assignments"
            );
            due_in_window.insert(course.id.clone(), filtered);
        }

        build_weekly_status(
            selected,
            &self.students,
            &due_in_window,
            &self.submissions,
            now,
            policy,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SNAPSHOT: &str = r#"{
        "courses": [
            {"id": 101, "name": "Biology", "course_code": "BIO-101"},
            {"id": "202", "name": "Chemistry"}
        ],
        "students": {
            "101": [{"id": 1, "name": "S1"}, {"id": 2, "name": "S2"}],
            "202": [{"id": 3, "name": "S3"}]
        },
        "assignments": {
            "101": [
                {"id": 11, "name": "A", "due_at": "2024-01-08T10:00:00Z", "lock_at": "2024-01-09T00:00:00Z"},
                {"id": 12, "name": "Old", "due_at": "2023-12-01T10:00:00Z"},
                {"id": 13, "name": "Undated"}
            ],
            "202": []
        },
        "submissions": {
            "101": {
                "11": [
                    {"user_id": 1, "submitted_at": null, "score": null, "excused": false},
                    {"user_id": "2", "submitted_at": null, "score": 5, "excused": false}
                ]
            },
            "202": {}
        }
    }"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 20, 0, 0, 0).unwrap()
    }

    fn window() -> ReportWindow {
        ReportWindow::parse("2024-01-08T00:00:00", "2024-01-14T23:59:00").unwrap()
    }

    #[test]
    fn selects_courses_in_snapshot_order() {
        let snapshot = Snapshot::from_json(SNAPSHOT).unwrap();
        let all = snapshot.select_courses(&[]).unwrap();
        assert_eq!(all.len(), 2);

        let one = snapshot.select_courses(&["202".into()]).unwrap();
        assert_eq!(one[0].name, "Chemistry");

        assert!(matches!(
            snapshot.select_courses(&["999".into()]),
            Err(NudgeError::MissingJoinKey {
                collection: "courses",
                ..
            })
        ));
    }

    #[test]
    fn builds_report_over_the_window() {
        let snapshot = Snapshot::from_json(SNAPSHOT).unwrap();
        let selected = snapshot.select_courses(&["101".into()]).unwrap();
        let report = snapshot
            .build_report(&selected, &window(), now(), DuplicatePolicy::First)
            .unwrap();

        let students = &report.courses[0].students;
        let s1 = &students[0];
        assert_eq!(s1.expired_assignments.len(), 1);
        assert_eq!(s1.expired_assignments[0].name, "A");
        assert!(s1.missing_assignments.is_empty());

        let s2 = &students[1];
        assert_eq!(s2.completed_assignments.len(), 1);
        assert!(s2.completed_all);
    }

    #[test]
    fn course_without_assignment_entry_is_rejected() {
        let mut snapshot = Snapshot::from_json(SNAPSHOT).unwrap();
        snapshot.assignments.remove(&EntityId::from("202"));
        let selected = snapshot.select_courses(&[]).unwrap();

        let err = snapshot
            .build_report(&selected, &window(), now(), DuplicatePolicy::First)
            .unwrap_err();
        assert!(matches!(
            err,
            NudgeError::MissingJoinKey {
                collection: "assignments",
                ..
            }
        ));
    }
}
