use serde::Serialize;

use crate::apply::{BatchOutcome, BatchResult};
use crate::domain::{Resolution, ResolvedRow, RowStatus};
use crate::error::CoreError;
use crate::export::{BatchLogRecord, ResultRecord};

/// Counters over one apply run. Every row lands in exactly one of the
/// first five buckets. In a dry run `applied` counts rows that would have
/// been sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub applied: usize,
    pub skipped_accounts: usize,
    pub skipped_tags: usize,
    pub skipped_both: usize,
    pub errors: usize,
    pub total_rows: usize,
    pub total_batches: usize,
    pub dry_run: bool,
}

impl Summary {
    pub fn bucket_total(&self) -> usize {
        self.applied + self.skipped_accounts + self.skipped_tags + self.skipped_both + self.errors
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub summary: Summary,
    pub rows: Vec<ResultRecord>,
    pub batches: Vec<BatchLogRecord>,
}

pub fn build_report(
    rows: &[ResolvedRow],
    results: &[BatchResult],
    dry_run: bool,
) -> Result<ApplyReport, CoreError> {
    let mut dispatched: Vec<Option<(RowStatus, Option<&str>)>> = vec![None; rows.len()];
    for result in results {
        let status = match result.outcome {
            BatchOutcome::Applied => RowStatus::Applied,
            BatchOutcome::Failed => RowStatus::Failed,
            BatchOutcome::SkippedDryRun => RowStatus::SkippedDryRun,
        };
        for &idx in &result.rows {
            let slot = dispatched
                .get_mut(idx)
                .ok_or(CoreError::UnknownRow(idx))?;
            *slot = Some((status, result.error.as_deref()));
        }
    }

    let mut summary = Summary {
        total_rows: rows.len(),
        total_batches: results.len(),
        dry_run,
        ..Summary::default()
    };
    let mut records = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        let (status, error) = match row.resolution() {
            Resolution::Unresolved(reason) => (reason.status(), None),
            Resolution::Resolved { .. } => dispatched[idx].ok_or(CoreError::UndispatchedRow(idx))?,
        };
        match status {
            RowStatus::Applied | RowStatus::SkippedDryRun => summary.applied += 1,
            RowStatus::Failed => summary.errors += 1,
            RowStatus::SkippedNoAccount => summary.skipped_accounts += 1,
            RowStatus::SkippedNoTag => summary.skipped_tags += 1,
            RowStatus::SkippedNoAccountAndTag => summary.skipped_both += 1,
        }
        records.push(ResultRecord {
            email_original: row.row.email_original.clone(),
            email: row.row.email_key.clone(),
            tag: row.row.tag_original.clone(),
            email_account_id: row.account_id,
            tag_id: row.tag_id,
            status,
            error: error.unwrap_or_default().to_string(),
        });
    }

    let batches = results
        .iter()
        .map(|result| BatchLogRecord {
            tag_id: result.tag_id,
            batch_size: result.size,
            status: result.outcome,
            error: result.error.clone().unwrap_or_default(),
        })
        .collect();

    Ok(ApplyReport {
        summary,
        rows: records,
        batches,
    })
}
