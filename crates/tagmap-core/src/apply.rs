use serde::{Deserialize, Serialize};
use std::fmt;

use crate::batch::Batch;
use crate::domain::{AccountId, TagId};

/// Remote side of the apply step. One call per batch, all-or-nothing.
pub trait TagApplier {
    fn apply_tag(&self, tag_id: TagId, account_ids: &[AccountId]) -> Result<(), ApplyFailure>;
}

/// Human-readable reason a batch was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    pub message: String,
}

impl ApplyFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ApplyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// How batches are dispatched. A dry run has no applier to call.
#[derive(Clone, Copy)]
pub enum ApplyMode<'a> {
    DryRun,
    Live(&'a dyn TagApplier),
}

impl ApplyMode<'_> {
    pub fn is_dry_run(&self) -> bool {
        matches!(self, ApplyMode::DryRun)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchOutcome {
    Applied,
    Failed,
    SkippedDryRun,
}

impl BatchOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchOutcome::Applied => "APPLIED",
            BatchOutcome::Failed => "FAILED",
            BatchOutcome::SkippedDryRun => "SKIPPED_DRY_RUN",
        }
    }
}

impl fmt::Display for BatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchResult {
    pub tag_id: TagId,
    pub size: usize,
    pub outcome: BatchOutcome,
    pub error: Option<String>,
    pub rows: Vec<usize>,
}

/// Sends every batch in order, one call at a time. A failed batch does not
/// stop the ones after it. `progress` gets `(done, total)` after each batch.
pub fn dispatch_batches<F>(
    batches: Vec<Batch>,
    mode: ApplyMode<'_>,
    mut progress: F,
) -> Vec<BatchResult>
where
    F: FnMut(usize, usize),
{
    let total = batches.len();
    let mut results = Vec::with_capacity(total);

    for (done, batch) in batches.into_iter().enumerate() {
        let (outcome, error) = match mode {
            ApplyMode::DryRun => (BatchOutcome::SkippedDryRun, None),
            ApplyMode::Live(applier) => match applier.apply_tag(batch.tag_id, &batch.account_ids) {
                Ok(()) => (BatchOutcome::Applied, None),
                Err(failure) => (BatchOutcome::Failed, Some(failure.message)),
            },
        };
        results.push(BatchResult {
            tag_id: batch.tag_id,
            size: batch.account_ids.len(),
            outcome,
            error,
            rows: batch.rows,
        });
        progress(done + 1, total);
    }

    results
}

#[cfg(test)]
mod tests {
    use super::{dispatch_batches, ApplyFailure, ApplyMode, BatchOutcome, TagApplier};
    use crate::batch::Batch;
    use crate::domain::{AccountId, TagId};
    use std::cell::RefCell;

    struct Recording {
        calls: RefCell<Vec<(TagId, Vec<AccountId>)>>,
        fail_first: bool,
    }

    impl TagApplier for Recording {
        fn apply_tag(&self, tag_id: TagId, account_ids: &[AccountId]) -> Result<(), ApplyFailure> {
            let mut calls = self.calls.borrow_mut();
            calls.push((tag_id, account_ids.to_vec()));
            if self.fail_first && calls.len() == 1 {
                return Err(ApplyFailure::new("rate limited"));
            }
            Ok(())
        }
    }

    fn batch(tag: i64, accounts: std::ops::Range<i64>) -> Batch {
        Batch {
            tag_id: TagId(tag),
            account_ids: accounts.clone().map(AccountId).collect(),
            rows: accounts.map(|id| id as usize).collect(),
        }
    }

    #[test]
    fn failed_batch_does_not_stop_the_next_one() {
        let applier = Recording {
            calls: RefCell::new(Vec::new()),
            fail_first: true,
        };
        let results = dispatch_batches(
            vec![batch(7, 0..25), batch(7, 25..30)],
            ApplyMode::Live(&applier),
            |_, _| {},
        );

        assert_eq!(applier.calls.borrow().len(), 2);
        assert_eq!(results[0].outcome, BatchOutcome::Failed);
        assert_eq!(results[0].error.as_deref(), Some("rate limited"));
        assert_eq!(results[1].outcome, BatchOutcome::Applied);
        assert_eq!(results[1].size, 5);
    }

    #[test]
    fn dry_run_never_calls_out() {
        let results = dispatch_batches(
            vec![batch(1, 0..3), batch(2, 3..4)],
            ApplyMode::DryRun,
            |_, _| {},
        );
        assert!(results
            .iter()
            .all(|result| result.outcome == BatchOutcome::SkippedDryRun && result.error.is_none()));
    }

    #[test]
    fn progress_reports_each_batch() {
        let mut seen = Vec::new();
        dispatch_batches(
            vec![batch(1, 0..1), batch(1, 1..2), batch(2, 2..3)],
            ApplyMode::DryRun,
            |done, total| seen.push((done, total)),
        );
        assert_eq!(seen, vec![(1, 3), (2, 3), (3, 3)]);
    }
}
