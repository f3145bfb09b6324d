//! Row shapes of the CSV files handed back to the operator.

use serde::{Deserialize, Serialize};

use crate::apply::BatchOutcome;
use crate::domain::{AccountId, NormalizedRow, ResolvedRow, RowStatus, TagId};

/// Placeholder written for an id that could not be resolved.
pub const MISSING_ID: &str = "n/a";

mod optional_id {
    use super::MISSING_ID;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Display,
    {
        match value {
            Some(id) => serializer.collect_str(id),
            None => serializer.serialize_str(MISSING_ID),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: FromStr,
        T::Err: Display,
    {
        let raw = String::deserialize(deserializer)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(MISSING_ID) {
            return Ok(None);
        }
        trimmed
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}

/// One line of the mapped export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedRecord {
    pub email: String,
    pub email_original: String,
    pub tag: String,
    #[serde(with = "optional_id")]
    pub email_account_id: Option<AccountId>,
    #[serde(with = "optional_id")]
    pub tag_id: Option<TagId>,
}

impl From<&ResolvedRow> for MappedRecord {
    fn from(resolved: &ResolvedRow) -> Self {
        Self {
            email: resolved.row.email_key.clone(),
            email_original: resolved.row.email_original.clone(),
            tag: resolved.row.tag_original.clone(),
            email_account_id: resolved.account_id,
            tag_id: resolved.tag_id,
        }
    }
}

impl From<MappedRecord> for ResolvedRow {
    /// The join already happened, so the tag key is just the stored tag.
    fn from(record: MappedRecord) -> Self {
        ResolvedRow {
            row: NormalizedRow {
                email_key: record.email,
                tag_key: record.tag.clone(),
                email_original: record.email_original,
                tag_original: record.tag,
            },
            account_id: record.email_account_id,
            tag_id: record.tag_id,
        }
    }
}

/// One line of the results export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub email_original: String,
    pub email: String,
    pub tag: String,
    #[serde(with = "optional_id")]
    pub email_account_id: Option<AccountId>,
    #[serde(with = "optional_id")]
    pub tag_id: Option<TagId>,
    pub status: RowStatus,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLogRecord {
    pub tag_id: TagId,
    pub batch_size: usize,
    pub status: BatchOutcome,
    pub error: String,
}
