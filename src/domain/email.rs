use std::fmt;

use serde::{Deserialize, Serialize};

const MIN_BODY_CHARS: usize = 20;
const MIN_SUBJECT_CHARS: usize = 3;

/// Content scraped from the currently displayed message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedContent {
    pub subject: String,
    pub sender: String,
    pub body: String,
    pub has_attachments: bool,
    pub links: Vec<String>,
}

impl ExtractedContent {
    /// Near-empty extractions are treated as "no email open" rather than as
    /// an empty message worth scanning.
    pub fn is_scannable(&self) -> bool {
        self.body.chars().count() >= MIN_BODY_CHARS
            || self.subject.chars().count() >= MIN_SUBJECT_CHARS
    }

    pub fn display_subject(&self) -> &str {
        if self.subject.trim().is_empty() {
            "No subject"
        } else {
            self.subject.as_str()
        }
    }
}

/// Stable identifier for one displayed message, used as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmailId(String);

impl EmailId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmailId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
