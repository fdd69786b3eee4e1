use thiserror::Error;

use crate::models::EntityId;

#[derive(Debug, Error)]
pub enum NudgeError {
    #[error("malformed timestamp in {field}: {value:?}")]
    MalformedTimestamp { field: &'static str, value: String },

    #[error("course {course_id} has no entry in {collection}")]
    MissingJoinKey {
        course_id: EntityId,
        collection: &'static str,
    },

    #[error("{template} template: {reason}")]
    TemplateFormat {
        template: &'static str,
        reason: String,
    },

    #[error("selection {0:?} is not of the form course_id:student_id")]
    UnknownSelection(String),
}

impl NudgeError {
    pub fn template(template: &'static str, reason: impl Into<String>) -> Self {
        NudgeError::TemplateFormat {
            template,
            reason: reason.into(),
        }
    }
}
