use crate::domain::ids::{AccountId, TagId};
use crate::domain::normalize::{normalize_email_key, normalize_tag_key, trim_value, TagMatching};
use crate::domain::status::RowStatus;

/// One uploaded spreadsheet row, exactly as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRow {
    pub email_raw: String,
    pub tag_raw: String,
}

impl InputRow {
    pub fn new(email_raw: impl Into<String>, tag_raw: impl Into<String>) -> Self {
        Self {
            email_raw: email_raw.into(),
            tag_raw: tag_raw.into(),
        }
    }

    pub fn normalize(&self, matching: TagMatching) -> NormalizedRow {
        NormalizedRow {
            email_key: normalize_email_key(&self.email_raw),
            tag_key: normalize_tag_key(&self.tag_raw, matching),
            email_original: trim_value(&self.email_raw).to_string(),
            tag_original: trim_value(&self.tag_raw).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRow {
    pub email_key: String,
    pub tag_key: String,
    pub email_original: String,
    /// Trimmed tag as the operator typed it.
    pub tag_original: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    pub row: NormalizedRow,
    pub account_id: Option<AccountId>,
    pub tag_id: Option<TagId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoAccount,
    NoTag,
    NoAccountAndTag,
}

impl SkipReason {
    pub fn status(self) -> RowStatus {
        match self {
            SkipReason::NoAccount => RowStatus::SkippedNoAccount,
            SkipReason::NoTag => RowStatus::SkippedNoTag,
            SkipReason::NoAccountAndTag => RowStatus::SkippedNoAccountAndTag,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Resolved { account_id: AccountId, tag_id: TagId },
    Unresolved(SkipReason),
}

impl ResolvedRow {
    pub fn resolution(&self) -> Resolution {
        match (self.account_id, self.tag_id) {
            (Some(account_id), Some(tag_id)) => Resolution::Resolved { account_id, tag_id },
            (None, Some(_)) => Resolution::Unresolved(SkipReason::NoAccount),
            (Some(_), None) => Resolution::Unresolved(SkipReason::NoTag),
            (None, None) => Resolution::Unresolved(SkipReason::NoAccountAndTag),
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.resolution(), Resolution::Resolved { .. })
    }
}
