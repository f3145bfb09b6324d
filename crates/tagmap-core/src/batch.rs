use std::collections::BTreeMap;

use crate::domain::{AccountId, Resolution, ResolvedRow, TagId};
use crate::error::CoreError;

/// Upper bound on account ids per tag-mapping call.
pub const EMAIL_BATCH_LIMIT: usize = 25;

/// One remote apply call: a tag and the accounts that receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub tag_id: TagId,
    pub account_ids: Vec<AccountId>,
    /// Positions of the member rows in the resolved row list.
    pub rows: Vec<usize>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.account_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.account_ids.is_empty()
    }
}

pub fn validate_batch_size(size: usize) -> Result<usize, CoreError> {
    if size == 0 || size > EMAIL_BATCH_LIMIT {
        return Err(CoreError::InvalidBatchSize(size));
    }
    Ok(size)
}

/// Groups fully resolved rows by tag and splits each group into chunks of at
/// most `batch_size` accounts. Groups come out in ascending tag id order and
/// rows keep their upload order inside a group.
pub fn plan_batches(rows: &[ResolvedRow], batch_size: usize) -> Result<Vec<Batch>, CoreError> {
    let batch_size = validate_batch_size(batch_size)?;

    let mut groups: BTreeMap<TagId, Vec<(usize, AccountId)>> = BTreeMap::new();
    for (idx, row) in rows.iter().enumerate() {
        if let Resolution::Resolved { account_id, tag_id } = row.resolution() {
            groups.entry(tag_id).or_default().push((idx, account_id));
        }
    }

    let mut batches = Vec::new();
    for (tag_id, members) in groups {
        for chunk in members.chunks(batch_size) {
            batches.push(Batch {
                tag_id,
                account_ids: chunk.iter().map(|(_, account_id)| *account_id).collect(),
                rows: chunk.iter().map(|(idx, _)| *idx).collect(),
            });
        }
    }
    Ok(batches)
}
