//! Join-key normalization shared by uploaded rows and remote lookup records.
//!
//! Both sides of the join go through the same functions, so a key produced
//! here is only ever compared with another key produced here.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagMatching {
    /// Tag names must match exactly after trimming.
    #[default]
    Exact,
    CaseInsensitive,
}

pub fn trim_value(raw: &str) -> &str {
    raw.trim()
}

/// Emails always compare case-insensitively.
pub fn normalize_email_key(raw: &str) -> String {
    trim_value(raw).to_lowercase()
}

pub fn normalize_tag_key(raw: &str, matching: TagMatching) -> String {
    let trimmed = trim_value(raw);
    match matching {
        TagMatching::Exact => trimmed.to_string(),
        TagMatching::CaseInsensitive => trimmed.to_lowercase(),
    }
}
