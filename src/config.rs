use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::{debug, info};

use crate::models::{EntityId, MessageTemplates};

const DEFAULT_CONGRATS: &str =
    "Hi {name},\n\nYou turned in everything that was due this week. Great work!";
const DEFAULT_ENCOURAGE: &str = "Hi {name},\n\nA few assignments from this week are still open:\n{missing_list}\n\nYou can still get them in.";

/// Saved defaults shared with the setup workflow. Keys the workflow stores but
/// the report does not need (API url, token) are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NudgerConfig {
    #[serde(default)]
    pub template_congrats: Option<String>,
    #[serde(default)]
    pub template_encourage: Option<String>,
    /// Comma-separated course ids, as typed into the setup form.
    #[serde(default)]
    pub course_ids_raw: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

impl NudgerConfig {
    /// Reads the defaults file; a file that does not exist yet means defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no defaults file, using built-in defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read defaults file {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("defaults file {} is not valid JSON", path.display()))?;
        info!(path = %path.display(), "loaded defaults");
        Ok(config)
    }

    pub fn templates(&self) -> MessageTemplates {
        let pick = |value: &Option<String>, fallback: &str| {
            value
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        MessageTemplates {
            congrats: pick(&self.template_congrats, DEFAULT_CONGRATS),
            encourage: pick(&self.template_encourage, DEFAULT_ENCOURAGE),
        }
    }

    pub fn course_ids(&self) -> Vec<EntityId> {
        self.course_ids_raw
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(EntityId::from)
            .collect()
    }
}
