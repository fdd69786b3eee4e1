use std::collections::HashMap;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use tracing::{debug, info};

use crate::error::NudgeError;
use crate::models::{
    Assignment, Completion, Course, CourseStatus, EntityId, Student, StudentStatus, Submission,
    WeeklyReport,
};
use crate::window::{is_expired, parse_timestamp};

/// Which submission counts when a student has several for one assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DuplicatePolicy {
    /// The first one in the order the source supplied them.
    #[default]
    First,
    /// The one with the latest parseable `submitted_at`.
    MostRecent,
}

/// Submissions for one course, keyed by assignment then student.
pub struct SubmissionIndex<'a> {
    by_assignment: HashMap<&'a EntityId, HashMap<&'a EntityId, &'a Submission>>,
}

impl<'a> SubmissionIndex<'a> {
    pub fn build(
        submissions: &'a HashMap<EntityId, Vec<Submission>>,
        policy: DuplicatePolicy,
    ) -> Self {
        let mut by_assignment = HashMap::with_capacity(submissions.len());

        for (assignment_id, list) in submissions {
            let mut by_student: HashMap<&EntityId, &Submission> = HashMap::new();
            for submission in list {
                match by_student.get(&submission.user_id).copied() {
                    None => {
                        by_student.insert(&submission.user_id, submission);
                    }
                    Some(existing) => {
                        debug!(
                            assignment = %assignment_id,
                            student = %submission.user_id,
                            "duplicate submission"
                        );
                        if policy == DuplicatePolicy::MostRecent
                            && submitted_instant(submission) > submitted_instant(existing)
                        {
                            by_student.insert(&submission.user_id, submission);
                        }
                    }
                }
            }
            by_assignment.insert(assignment_id, by_student);
        }

        Self { by_assignment }
    }

    pub fn find(&self, assignment_id: &EntityId, student_id: &EntityId) -> Option<&'a Submission> {
        self.by_assignment
            .get(assignment_id)
            .and_then(|by_student| by_student.get(student_id))
            .copied()
    }
}

fn submitted_instant(submission: &Submission) -> Option<DateTime<Utc>> {
    submission
        .submitted_at
        .as_deref()
        .and_then(|raw| parse_timestamp("submitted_at", raw).ok())
}

/// A submission that was turned in, scored above zero or excused completes the
/// assignment even after it locks.
pub fn classify(submission: Option<&Submission>, expired: bool) -> Completion {
    let done = submission.is_some_and(|s| {
        s.submitted_at.is_some() || s.score.is_some_and(|score| score > 0.0) || s.excused
    });

    if done {
        Completion::Completed
    } else if expired {
        Completion::Expired
    } else {
        Completion::Missing
    }
}

pub fn student_status(
    student: &Student,
    assignments: &[Assignment],
    expired: &[bool],
    index: &SubmissionIndex<'_>,
) -> StudentStatus {
    let mut status = StudentStatus {
        id: student.id.clone(),
        name: student.name.clone(),
        completed_all: false,
        completed_assignments: Vec::new(),
        missing_assignments: Vec::new(),
        expired_assignments: Vec::new(),
    };

    for (assignment, &expired) in assignments.iter().zip(expired) {
        let submission = index.find(&assignment.id, &student.id);
        let bucket = match classify(submission, expired) {
            Completion::Completed => &mut status.completed_assignments,
            Completion::Missing => &mut status.missing_assignments,
            Completion::Expired => &mut status.expired_assignments,
        };
        bucket.push(assignment.clone());
    }

    status.completed_all = status.missing_assignments.is_empty();
    status
}

/// Joins every selected course's roster against its (already window-filtered)
/// assignments and their submissions. Assignments with no submission list are
/// treated as having none.
pub fn build_weekly_status(
    courses: &[Course],
    students: &HashMap<EntityId, Vec<Student>>,
    assignments: &HashMap<EntityId, Vec<Assignment>>,
    submissions: &HashMap<EntityId, HashMap<EntityId, Vec<Submission>>>,
    now: DateTime<Utc>,
    policy: DuplicatePolicy,
) -> Result<WeeklyReport, NudgeError> {
    let mut report = WeeklyReport::default();

    for course in courses {
        let missing_key = |collection| NudgeError::MissingJoinKey {
            course_id: course.id.clone(),
            collection,
        };
        let roster = students.get(&course.id).ok_or_else(|| missing_key("students"))?;
        let course_assignments = assignments
            .get(&course.id)
            .ok_or_else(|| missing_key("assignments"))?;
        let course_submissions = submissions
            .get(&course.id)
            .ok_or_else(|| missing_key("submissions"))?;

        let index = SubmissionIndex::build(course_submissions, policy);
        let expired: Vec<bool> = course_assignments
            .iter()
            .map(|assignment| is_expired(assignment, now))
            .collect();

        let statuses: Vec<StudentStatus> = roster
            .iter()
            .map(|student| student_status(student, course_assignments, &expired, &index))
            .collect();

        let behind = statuses.iter().filter(|s| !s.completed_all).count();
        info!(
            course = %course.id,
            students = statuses.len(),
            assignments = course_assignments.len(),
            behind,
            "course status built"
        );

        report.courses.push(CourseStatus {
            id: course.id.clone(),
            name: course.name.clone(),
            students: statuses,
        });
    }

    Ok(report)
}
