use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Identifier carried by the source data, normalized to its string form once at
/// ingestion. Numeric and textual ids for the same record compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct EntityId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Signed(i64),
    Unsigned(u64),
    Text(String),
}

impl From<RawId> for EntityId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Signed(value) => EntityId(value.to_string()),
            RawId::Unsigned(value) => EntityId(value.to_string()),
            RawId::Text(value) => EntityId(value),
        }
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        EntityId(value)
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        EntityId(value.to_string())
    }
}

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub course_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
}

/// Timestamps stay in their source ISO-8601 form; they are parsed where they
/// are compared so that each site can apply its own failure policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub lock_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub user_id: EntityId,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub excused: bool,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Completed,
    Missing,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStatus {
    pub id: EntityId,
    pub name: String,
    pub completed_all: bool,
    pub completed_assignments: Vec<Assignment>,
    pub missing_assignments: Vec<Assignment>,
    pub expired_assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseStatus {
    pub id: EntityId,
    pub name: String,
    pub students: Vec<StudentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub courses: Vec<CourseStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTemplates {
    pub congrats: String,
    pub encourage: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Congrats,
    Encourage,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Congrats => "congrats",
            MessageType::Encourage => "encourage",
        }
    }

    pub fn subject(self) -> &'static str {
        match self {
            MessageType::Congrats => "Great work this week!",
            MessageType::Encourage => "A quick update on your assignments",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedMessage {
    pub message_type: MessageType,
    pub message_body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingMessage {
    pub course_id: EntityId,
    pub course_name: String,
    pub student_id: EntityId,
    pub student_name: String,
    pub message_type: MessageType,
    pub subject: String,
    pub message_body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachBatch {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub messages: Vec<PendingMessage>,
}
