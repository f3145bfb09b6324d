use tagmap_core::{AccountRecord, TagRecord};
use tracing::{debug, warn};

use crate::{RemoteError, Result};

/// Somewhere the account and tag tables can be read from.
pub trait LookupSource {
    fn source_name(&self) -> &'static str;
    fn fetch_accounts(&self) -> Result<Vec<AccountRecord>>;
    fn fetch_tags(&self) -> Result<Vec<TagRecord>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupTables {
    pub accounts: Vec<AccountRecord>,
    pub tags: Vec<TagRecord>,
}

impl LookupTables {
    /// Both tables or nothing: a failure on either aborts the lookup.
    pub fn fetch(source: &dyn LookupSource) -> Result<Self> {
        let accounts = source.fetch_accounts()?;
        let tags = source.fetch_tags()?;
        debug!(
            source = source.source_name(),
            accounts = accounts.len(),
            tags = tags.len(),
            "lookup tables fetched"
        );
        Ok(Self { accounts, tags })
    }
}

/// Ordered fallback list. Each table comes from the first source that
/// answers; when every source fails the last error is returned.
#[derive(Default)]
pub struct LookupChain<'a> {
    sources: Vec<Box<dyn LookupSource + 'a>>,
}

impl<'a> LookupChain<'a> {
    pub fn new(sources: Vec<Box<dyn LookupSource + 'a>>) -> Self {
        Self { sources }
    }

    pub fn push(&mut self, source: Box<dyn LookupSource + 'a>) {
        self.sources.push(source);
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn first_success<T, F>(&self, table: &'static str, fetch: F) -> Result<T>
    where
        F: Fn(&dyn LookupSource) -> Result<T>,
    {
        let mut last_err = None;
        for source in &self.sources {
            match fetch(source.as_ref()) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(
                        source = source.source_name(),
                        table,
                        error = %err,
                        "lookup source failed"
                    );
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            RemoteError::Unavailable("no lookup sources configured".to_string())
        }))
    }
}

impl LookupSource for LookupChain<'_> {
    fn source_name(&self) -> &'static str {
        "chain"
    }

    fn fetch_accounts(&self) -> Result<Vec<AccountRecord>> {
        self.first_success("accounts", |source| source.fetch_accounts())
    }

    fn fetch_tags(&self) -> Result<Vec<TagRecord>> {
        self.first_success("tags", |source| source.fetch_tags())
    }
}
