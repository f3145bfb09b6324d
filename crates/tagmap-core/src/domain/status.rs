use serde::{Deserialize, Serialize};
use std::fmt;

/// Final per-row status written to the results export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowStatus {
    Applied,
    Failed,
    SkippedNoAccount,
    SkippedNoTag,
    SkippedNoAccountAndTag,
    SkippedDryRun,
}

impl RowStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RowStatus::Applied => "APPLIED",
            RowStatus::Failed => "FAILED",
            RowStatus::SkippedNoAccount => "SKIPPED_NO_ACCOUNT",
            RowStatus::SkippedNoTag => "SKIPPED_NO_TAG",
            RowStatus::SkippedNoAccountAndTag => "SKIPPED_NO_ACCOUNT_AND_TAG",
            RowStatus::SkippedDryRun => "SKIPPED_DRY_RUN",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::RowStatus;

    #[test]
    fn display_matches_serde_name() {
        let json = serde_json::to_string(&RowStatus::SkippedNoAccountAndTag).expect("json");
        assert_eq!(json, "\"SKIPPED_NO_ACCOUNT_AND_TAG\"");
        assert_eq!(
            RowStatus::SkippedNoAccountAndTag.to_string(),
            "SKIPPED_NO_ACCOUNT_AND_TAG"
        );
    }
}
