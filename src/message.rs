use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::NudgeError;
use crate::models::{
    EntityId, GeneratedMessage, MessageTemplates, MessageType, OutreachBatch, PendingMessage,
    StudentStatus, WeeklyReport,
};

const UNKNOWN_DUE_DATE: &str = "unknown due date";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placeholder {
    Name,
    MissingList,
}

impl Placeholder {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "name" => Some(Placeholder::Name),
            "missing_list" => Some(Placeholder::MissingList),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Placeholder::Name => "name",
            Placeholder::MissingList => "missing_list",
        }
    }
}

impl MessageType {
    fn declared(self) -> &'static [Placeholder] {
        match self {
            MessageType::Congrats => &[Placeholder::Name],
            MessageType::Encourage => &[Placeholder::Name, Placeholder::MissingList],
        }
    }

    fn required(self) -> &'static [Placeholder] {
        match self {
            MessageType::Congrats => &[],
            MessageType::Encourage => &[Placeholder::MissingList],
        }
    }
}

#[derive(Debug, PartialEq)]
enum Segment {
    Text(String),
    Slot(Placeholder),
}

/// A message template checked against the placeholders its kind declares.
/// `{key}` substitutes a value, `{{` and `}}` are literal braces.
#[derive(Debug)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(kind: MessageType, source: &str) -> Result<Self, NudgeError> {
        let fail = |reason: String| NudgeError::template(kind.as_str(), reason);
        let mut segments = Vec::new();
        let mut text = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    text.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    text.push('}');
                }
                '}' => return Err(fail("single '}' encountered".to_string())),
                '{' => {
                    let mut key = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => key.push(c),
                            None => return Err(fail("unclosed '{' in template".to_string())),
                        }
                    }

                    let placeholder = Placeholder::parse(&key)
                        .filter(|p| kind.declared().contains(p))
                        .ok_or_else(|| fail(format!("undeclared placeholder {{{key}}}")))?;
                    if !text.is_empty() {
                        segments.push(Segment::Text(std::mem::take(&mut text)));
                    }
                    segments.push(Segment::Slot(placeholder));
                }
                c => text.push(c),
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text));
        }

        for required in kind.required() {
            if !segments.contains(&Segment::Slot(*required)) {
                return Err(fail(format!("required placeholder {{{}}} is absent", required.key())));
            }
        }

        Ok(Self { segments })
    }

    fn render(&self, name: &str, missing_list: &str) -> String {
        let mut body = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => body.push_str(text),
                Segment::Slot(Placeholder::Name) => body.push_str(name),
                Segment::Slot(Placeholder::MissingList) => body.push_str(missing_list),
            }
        }
        body
    }
}

/// One line per missing assignment that has not also expired.
pub fn missing_list(status: &StudentStatus) -> String {
    status
        .missing_assignments
        .iter()
        .filter(|a| !status.expired_assignments.iter().any(|e| e.id == a.id))
        .map(|a| {
            let due = a
                .due_at
                .as_deref()
                .filter(|d| !d.is_empty())
                .unwrap_or(UNKNOWN_DUE_DATE);
            format!("- {} (due {})", a.name, due)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn generate_message(
    status: &StudentStatus,
    templates: &MessageTemplates,
) -> Result<GeneratedMessage, NudgeError> {
    let (message_type, source) = if status.completed_all {
        (MessageType::Congrats, &templates.congrats)
    } else {
        (MessageType::Encourage, &templates.encourage)
    };

    let template = Template::parse(message_type, source)?;
    let list = match message_type {
        MessageType::Congrats => String::new(),
        MessageType::Encourage => missing_list(status),
    };

    Ok(GeneratedMessage {
        message_type,
        message_body: template.render(&status.name, &list),
    })
}

/// Renders both templates against sample data so a bad template fails before
/// any student sees it.
pub fn preview_templates(templates: &MessageTemplates) -> Result<(String, String), NudgeError> {
    let name = "Sample Student";
    let missing = "- Assignment 1 (due 2024-01-10)\n- Assignment 2 (due 2024-01-12)";

    let congrats = Template::parse(MessageType::Congrats, &templates.congrats)?;
    let encourage = Template::parse(MessageType::Encourage, &templates.encourage)?;
    Ok((congrats.render(name, ""), encourage.render(name, missing)))
}

/// Builds the pending messages for the `course_id:student_id` keys in
/// `selections`, or for everyone in the report when no keys are given. Keys that
/// name an unknown course or student are skipped.
pub fn build_outreach(
    report: &WeeklyReport,
    selections: &[String],
    templates: &MessageTemplates,
    now: DateTime<Utc>,
) -> Result<OutreachBatch, NudgeError> {
    let mut messages = Vec::new();

    if selections.is_empty() {
        for course in &report.courses {
            for student in &course.students {
                messages.push(pending(course.id.clone(), &course.name, student, templates)?);
            }
        }
    } else {
        for key in selections {
            let (course_id, student_id) = key
                .split_once(':')
                .ok_or_else(|| NudgeError::UnknownSelection(key.clone()))?;

            let Some(course) = report.courses.iter().find(|c| c.id.as_str() == course_id) else {
                warn!(course = course_id, "selected course is not in the report");
                continue;
            };
            let Some(student) = course.students.iter().find(|s| s.id.as_str() == student_id)
            else {
                warn!(course = course_id, student = student_id, "selected student is not in the course");
                continue;
            };

            messages.push(pending(course.id.clone(), &course.name, student, templates)?);
        }
    }

    let batch = OutreachBatch {
        batch_id: Uuid::new_v4(),
        generated_at: now,
        messages,
    };
    info!(batch = %batch.batch_id, messages = batch.messages.len(), "outreach batch ready");
    Ok(batch)
}

fn pending(
    course_id: EntityId,
    course_name: &str,
    student: &StudentStatus,
    templates: &MessageTemplates,
) -> Result<PendingMessage, NudgeError> {
    let message = generate_message(student, templates)?;
    Ok(PendingMessage {
        course_id,
        course_name: course_name.to_string(),
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        message_type: message.message_type,
        subject: message.message_type.subject().to_string(),
        message_body: message.message_body,
    })
}
