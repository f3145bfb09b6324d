//! Stage outputs handed from one step of a run to the next.
//!
//! `Upload` is what was read from the spreadsheet, `Mapping` is the upload
//! joined against the remote tables, and `ApplyReport` is what came back from
//! applying the mapping. Each stage owns its output; nothing is shared.

use crate::apply::{dispatch_batches, ApplyMode};
use crate::batch::plan_batches;
use crate::domain::{
    AccountId, AccountRecord, InputRow, ResolvedRow, TagId, TagMatching, TagRecord,
};
use crate::error::CoreError;
use crate::export::MappedRecord;
use crate::reconcile::{reconcile, KeyCollision, KeyIndex};
use crate::report::{build_report, ApplyReport};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upload {
    pub rows: Vec<InputRow>,
}

impl Upload {
    pub fn new(rows: Vec<InputRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    pub rows: Vec<ResolvedRow>,
    pub account_collisions: Vec<KeyCollision<AccountId>>,
    pub tag_collisions: Vec<KeyCollision<TagId>>,
}

impl Mapping {
    /// Rebuilds a mapping from a previously exported mapped file.
    pub fn from_records(records: Vec<MappedRecord>) -> Self {
        Self {
            rows: records.into_iter().map(ResolvedRow::from).collect(),
            account_collisions: Vec::new(),
            tag_collisions: Vec::new(),
        }
    }

    pub fn records(&self) -> Vec<MappedRecord> {
        self.rows.iter().map(MappedRecord::from).collect()
    }

    pub fn resolved_count(&self) -> usize {
        self.rows.iter().filter(|row| row.is_resolved()).count()
    }

    pub fn has_collisions(&self) -> bool {
        !self.account_collisions.is_empty() || !self.tag_collisions.is_empty()
    }
}

pub fn map_upload(
    upload: &Upload,
    accounts: &[AccountRecord],
    tags: &[TagRecord],
    matching: TagMatching,
) -> Mapping {
    let account_index = KeyIndex::from_accounts(accounts);
    let tag_index = KeyIndex::from_tags(tags, matching);
    let normalized: Vec<_> = upload
        .rows
        .iter()
        .map(|row| row.normalize(matching))
        .collect();

    Mapping {
        rows: reconcile(&normalized, &account_index, &tag_index),
        account_collisions: account_index.collisions().to_vec(),
        tag_collisions: tag_index.collisions().to_vec(),
    }
}

pub fn apply_mapping<F>(
    mapping: &Mapping,
    batch_size: usize,
    mode: ApplyMode<'_>,
    progress: F,
) -> Result<ApplyReport, CoreError>
where
    F: FnMut(usize, usize),
{
    let batches = plan_batches(&mapping.rows, batch_size)?;
    let results = dispatch_batches(batches, mode, progress);
    build_report(&mapping.rows, &results, mode.is_dry_run())
}

#[cfg(test)]
mod tests {
    use super::{apply_mapping, map_upload, Mapping, Upload};
    use crate::apply::{ApplyFailure, ApplyMode, BatchOutcome, TagApplier};
    use crate::batch::EMAIL_BATCH_LIMIT;
    use crate::domain::{
        AccountId, AccountRecord, InputRow, RowStatus, TagId, TagMatching, TagRecord,
    };
    use std::cell::Cell;

    struct FailEveryOther {
        calls: Cell<usize>,
    }

    impl TagApplier for FailEveryOther {
        fn apply_tag(
            &self,
            _tag_id: TagId,
            _account_ids: &[AccountId],
        ) -> Result<(), ApplyFailure> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            if call % 2 == 0 {
                Err(ApplyFailure::new("upstream rejected batch"))
            } else {
                Ok(())
            }
        }
    }

    fn accounts(count: i64) -> Vec<AccountRecord> {
        (1..=count)
            .map(|id| AccountRecord::new(id, format!("user{id}@x.com")))
            .collect()
    }

    #[test]
    fn maps_and_applies_single_row() {
        let upload = Upload::new(vec![InputRow::new("A@X.com", "vip")]);
        let mapping = map_upload(
            &upload,
            &[AccountRecord::new(1, "a@x.com")],
            &[TagRecord::new(9, "VIP")],
            TagMatching::CaseInsensitive,
        );
        assert_eq!(mapping.rows[0].account_id, Some(AccountId(1)));
        assert_eq!(mapping.rows[0].tag_id, Some(TagId(9)));

        let report =
            apply_mapping(&mapping, EMAIL_BATCH_LIMIT, ApplyMode::DryRun, |_, _| {}).expect("apply");
        assert_eq!(report.batches.len(), 1);
        assert_eq!(report.batches[0].tag_id, TagId(9));
        assert_eq!(report.batches[0].batch_size, 1);
    }

    #[test]
    fn dry_run_reports_no_failures() {
        let upload = Upload::new(
            (1..=30)
                .map(|id| InputRow::new(format!("user{id}@x.com"), "vip"))
                .collect(),
        );
        let mapping = map_upload(
            &upload,
            &accounts(30),
            &[TagRecord::new(9, "vip")],
            TagMatching::Exact,
        );
        let report =
            apply_mapping(&mapping, EMAIL_BATCH_LIMIT, ApplyMode::DryRun, |_, _| {}).expect("apply");

        assert!(report.summary.dry_run);
        assert_eq!(report.summary.errors, 0);
        assert_eq!(report.summary.applied, 30);
        assert!(report
            .rows
            .iter()
            .all(|row| row.status == RowStatus::SkippedDryRun));
        assert!(report
            .batches
            .iter()
            .all(|batch| batch.status == BatchOutcome::SkippedDryRun));
    }

    #[test]
    fn failed_chunk_marks_only_its_rows() {
        let upload = Upload::new(
            (1..=30)
                .map(|id| InputRow::new(format!("user{id}@x.com"), "vip"))
                .collect(),
        );
        let mapping = map_upload(
            &upload,
            &accounts(30),
            &[TagRecord::new(9, "vip")],
            TagMatching::Exact,
        );
        let applier = FailEveryOther {
            calls: Cell::new(0),
        };
        let report = apply_mapping(
            &mapping,
            EMAIL_BATCH_LIMIT,
            ApplyMode::Live(&applier),
            |_, _| {},
        )
        .expect("apply");

        assert_eq!(applier.calls.get(), 2);
        assert_eq!(report.summary.total_batches, 2);
        assert_eq!(report.summary.errors, 25);
        assert_eq!(report.summary.applied, 5);
        assert!(report.rows[..25]
            .iter()
            .all(|row| row.status == RowStatus::Failed && row.error == "upstream rejected batch"));
        assert!(report.rows[25..]
            .iter()
            .all(|row| row.status == RowStatus::Applied));
    }

    #[test]
    fn buckets_always_sum_to_total_rows() {
        let upload = Upload::new(vec![
            InputRow::new("user1@x.com", "vip"),
            InputRow::new("user2@x.com", "missing"),
            InputRow::new("ghost@x.com", "vip"),
            InputRow::new("ghost@x.com", "missing"),
            InputRow::new("", ""),
            InputRow::new(" USER3@x.com ", " vip "),
        ]);
        let mapping = map_upload(
            &upload,
            &accounts(3),
            &[TagRecord::new(9, "vip")],
            TagMatching::Exact,
        );
        let applier = FailEveryOther {
            calls: Cell::new(0),
        };
        for report in [
            apply_mapping(&mapping, 1, ApplyMode::DryRun, |_, _| {}).expect("dry"),
            apply_mapping(&mapping, 1, ApplyMode::Live(&applier), |_, _| {}).expect("live"),
        ] {
            assert_eq!(report.summary.total_rows, 6);
            assert_eq!(report.summary.bucket_total(), report.summary.total_rows);
            assert_eq!(report.summary.skipped_tags, 1);
            assert_eq!(report.summary.skipped_accounts, 1);
            assert_eq!(report.summary.skipped_both, 2);
        }
    }

    #[test]
    fn mapping_surfaces_lookup_collisions() {
        let upload = Upload::new(vec![InputRow::new("a@x.com", "vip")]);
        let mapping = map_upload(
            &upload,
            &[AccountRecord::new(1, "a@x.com"), AccountRecord::new(2, "A@x.com")],
            &[TagRecord::new(9, "vip")],
            TagMatching::Exact,
        );
        assert!(mapping.has_collisions());
        assert_eq!(mapping.account_collisions[0].key, "a@x.com");
        assert!(mapping.tag_collisions.is_empty());
    }

    #[test]
    fn mapping_survives_export_round_trip() {
        let upload = Upload::new(vec![
            InputRow::new("user1@x.com", "VIP"),
            InputRow::new("nobody@x.com", "VIP"),
        ]);
        let mapping = map_upload(
            &upload,
            &accounts(1),
            &[TagRecord::new(9, "VIP")],
            TagMatching::Exact,
        );
        let restored = Mapping::from_records(mapping.records());
        assert_eq!(restored.resolved_count(), 1);
        assert_eq!(restored.rows[0].account_id, mapping.rows[0].account_id);
        assert_eq!(restored.rows[1].tag_id, Some(TagId(9)));
    }
}
