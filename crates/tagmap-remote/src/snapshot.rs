//! Local JSON copy of the lookup tables, for offline mapping and review.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tagmap_core::{AccountRecord, TagRecord};

use crate::records::{collect_accounts, collect_tags, RawAccount, RawTag};
use crate::source::{LookupSource, LookupTables};
use crate::{RemoteError, Result};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SnapshotFile {
    #[serde(default)]
    accounts: Vec<RawAccount>,
    #[serde(default)]
    tags: Vec<RawTag>,
}

#[derive(Debug, Serialize)]
struct SnapshotOut<'a> {
    accounts: &'a [AccountRecord],
    tags: &'a [TagRecord],
}

pub fn parse_snapshot(data: &str) -> Result<LookupTables> {
    let parsed: SnapshotFile = serde_json::from_str(data)
        .map_err(|err| RemoteError::Parse(format!("invalid snapshot: {err}")))?;
    Ok(LookupTables {
        accounts: collect_accounts(parsed.accounts)?,
        tags: collect_tags(parsed.tags)?,
    })
}

pub fn render_snapshot(tables: &LookupTables) -> Result<String> {
    serde_json::to_string_pretty(&SnapshotOut {
        accounts: &tables.accounts,
        tags: &tables.tags,
    })
    .map_err(|err| RemoteError::Parse(err.to_string()))
}

#[derive(Debug, Clone)]
pub struct SnapshotSource {
    tables: LookupTables,
}

impl SnapshotSource {
    pub fn open(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(Self {
            tables: parse_snapshot(&data)?,
        })
    }
}

impl LookupSource for SnapshotSource {
    fn source_name(&self) -> &'static str {
        "snapshot"
    }

    fn fetch_accounts(&self) -> Result<Vec<AccountRecord>> {
        Ok(self.tables.accounts.clone())
    }

    fn fetch_tags(&self) -> Result<Vec<TagRecord>> {
        Ok(self.tables.tags.clone())
    }
}
