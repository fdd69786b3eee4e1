use std::fmt::Write;

use crate::message::missing_list;
use crate::models::{CourseStatus, OutreachBatch, WeeklyReport};
use crate::window::ReportWindow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CourseSummary {
    pub students: usize,
    pub completed_all: usize,
    pub with_missing: usize,
    pub with_expired: usize,
}

pub fn summarize_course(course: &CourseStatus) -> CourseSummary {
    let mut summary = CourseSummary {
        students: course.students.len(),
        ..CourseSummary::default()
    };

    for student in &course.students {
        if student.completed_all {
            summary.completed_all += 1;
        } else {
            summary.with_missing += 1;
        }
        if !student.expired_assignments.is_empty() {
            summary.with_expired += 1;
        }
    }

    summary
}

pub fn build_report(report: &WeeklyReport, window: &ReportWindow) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Assignment Report");
    let _ = writeln!(
        output,
        "Assignments due {} to {}",
        window.start.format("%b %d, %Y %H:%M UTC"),
        window.end.format("%b %d, %Y %H:%M UTC")
    );

    if report.courses.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "No courses selected.");
        return output;
    }

    for course in &report.courses {
        let summary = summarize_course(course);
        let _ = writeln!(output);
        let _ = writeln!(output, "## {} ({})", course.name, course.id);
        let _ = writeln!(
            output,
            "{} students: {} caught up, {} with missing work, {} with expired work",
            summary.students, summary.completed_all, summary.with_missing, summary.with_expired
        );

        if course.students.is_empty() {
            let _ = writeln!(output, "No students enrolled.");
            continue;
        }

        for student in &course.students {
            let state = if student.completed_all {
                "caught up"
            } else {
                "behind"
            };
            let _ = writeln!(
                output,
                "- {} ({}): {}, {} completed, {} missing, {} expired",
                student.name,
                student.id,
                state,
                student.completed_assignments.len(),
                student.missing_assignments.len(),
                student.expired_assignments.len()
            );

            let lines = missing_list(student);
            for line in lines.lines() {
                let _ = writeln!(output, "  {line}");
            }
        }
    }

    output
}

pub fn write_outreach_csv<W: std::io::Write>(
    batch: &OutreachBatch,
    writer: W,
) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "batch_id",
        "course_id",
        "course_name",
        "student_id",
        "student_name",
        "message_type",
        "subject",
        "message_body",
    ])?;

    let batch_id = batch.batch_id.to_string();
    for message in &batch.messages {
        csv.write_record([
            batch_id.as_str(),
            message.course_id.as_str(),
            message.course_name.as_str(),
            message.student_id.as_str(),
            message.student_name.as_str(),
            message.message_type.as_str(),
            message.subject.as_str(),
            message.message_body.as_str(),
        ])?;
    }

    csv.flush()?;
    Ok(())
}
