use std::cell::RefCell;

use tagmap_core::{
    apply_mapping, map_upload, AccountId, AccountRecord, ApplyFailure, ApplyMode, BatchOutcome,
    InputRow, Mapping, RowStatus, TagApplier, TagId, TagMatching, TagRecord, Upload,
    EMAIL_BATCH_LIMIT,
};

#[derive(Default)]
struct Recorder {
    calls: RefCell<Vec<(TagId, Vec<AccountId>)>>,
    reject_tag: Option<TagId>,
}

impl TagApplier for Recorder {
    fn apply_tag(&self, tag_id: TagId, account_ids: &[AccountId]) -> Result<(), ApplyFailure> {
        self.calls.borrow_mut().push((tag_id, account_ids.to_vec()));
        if self.reject_tag == Some(tag_id) {
            return Err(ApplyFailure::new("Tag is archived"));
        }
        Ok(())
    }
}

fn accounts(count: i64) -> Vec<AccountRecord> {
    (1..=count)
        .map(|id| AccountRecord::new(id, format!("user{id}@example.com")))
        .collect()
}

fn tags() -> Vec<TagRecord> {
    vec![TagRecord::new(9, "VIP"), TagRecord::new(3, "Cold")]
}

fn mapping_for(rows: Vec<InputRow>, account_count: i64) -> Mapping {
    map_upload(
        &Upload::new(rows),
        &accounts(account_count),
        &tags(),
        TagMatching::CaseInsensitive,
    )
}

#[test]
fn live_run_groups_by_tag_and_chunks() {
    let mut rows: Vec<InputRow> = (1..=30)
        .map(|id| InputRow::new(format!("USER{id}@example.com"), "vip"))
        .collect();
    rows.push(InputRow::new("user1@example.com", " cold "));
    rows.push(InputRow::new("nobody@example.com", "vip"));
    let mapping = mapping_for(rows, 30);

    let applier = Recorder::default();
    let mut ticks = Vec::new();
    let report = apply_mapping(
        &mapping,
        EMAIL_BATCH_LIMIT,
        ApplyMode::Live(&applier),
        |done, total| ticks.push((done, total)),
    )
    .expect("apply");

    let calls = applier.calls.borrow();
    let sizes: Vec<(i64, usize)> = calls
        .iter()
        .map(|(tag, ids)| (tag.0, ids.len()))
        .collect();
    assert_eq!(sizes, vec![(3, 1), (9, 25), (9, 5)]);
    assert_eq!(ticks, vec![(1, 3), (2, 3), (3, 3)]);

    assert_eq!(report.summary.applied, 31);
    assert_eq!(report.summary.skipped_accounts, 1);
    assert_eq!(report.summary.total_batches, 3);
    assert_eq!(report.summary.bucket_total(), report.summary.total_rows);
    assert!(!report.summary.dry_run);
    assert_eq!(report.rows[30].status, RowStatus::Applied);
    assert_eq!(report.rows[31].status, RowStatus::SkippedNoAccount);
}

#[test]
fn rejected_batch_only_fails_its_rows() {
    let rows = vec![
        InputRow::new("user1@example.com", "VIP"),
        InputRow::new("user2@example.com", "Cold"),
        InputRow::new("user3@example.com", "VIP"),
    ];
    let mapping = mapping_for(rows, 3);
    let applier = Recorder {
        reject_tag: Some(TagId(9)),
        ..Recorder::default()
    };

    let report =
        apply_mapping(&mapping, 25, ApplyMode::Live(&applier), |_, _| {}).expect("apply");

    assert_eq!(report.summary.errors, 2);
    assert_eq!(report.summary.applied, 1);
    assert_eq!(report.rows[0].status, RowStatus::Failed);
    assert_eq!(report.rows[0].error, "Tag is archived");
    assert_eq!(report.rows[1].status, RowStatus::Applied);
    assert_eq!(report.rows[1].error, "");
    assert_eq!(report.batches[1].status, BatchOutcome::Failed);
}

#[test]
fn dry_run_makes_no_calls() {
    let rows = vec![
        InputRow::new("user1@example.com", "VIP"),
        InputRow::new("user2@example.com", "missing"),
    ];
    let mapping = mapping_for(rows, 2);

    let report = apply_mapping(&mapping, 25, ApplyMode::DryRun, |_, _| {}).expect("apply");
    assert!(report.summary.dry_run);
    assert_eq!(report.summary.errors, 0);
    assert_eq!(report.rows[0].status, RowStatus::SkippedDryRun);
    assert_eq!(report.rows[1].status, RowStatus::SkippedNoTag);
    assert_eq!(report.batches[0].status, BatchOutcome::SkippedDryRun);
}

#[test]
fn mapped_records_survive_a_reload() {
    let rows = vec![
        InputRow::new(" User1@Example.com", "VIP"),
        InputRow::new("stranger@example.com", "Cold"),
    ];
    let mapping = mapping_for(rows, 1);
    let reloaded = Mapping::from_records(mapping.records());

    let first = apply_mapping(&mapping, 25, ApplyMode::DryRun, |_, _| {}).expect("apply");
    let second = apply_mapping(&reloaded, 25, ApplyMode::DryRun, |_, _| {}).expect("apply");
    assert_eq!(first, second);
}

#[test]
fn oversized_batch_is_rejected_before_dispatch() {
    let mapping = mapping_for(vec![InputRow::new("user1@example.com", "VIP")], 1);
    let applier = Recorder::default();
    assert!(apply_mapping(&mapping, 26, ApplyMode::Live(&applier), |_, _| {}).is_err());
    assert!(applier.calls.borrow().is_empty());
}
