use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tagmap_core::{AccountRecord, TagRecord};
use tracing::debug;

use crate::source::LookupSource;
use crate::Result;

struct Entry<T> {
    fetched_at: Instant,
    value: T,
}

type Slot<T> = Mutex<HashMap<String, Entry<T>>>;

/// Time-bounded memo of the two lookup tables, keyed only by credential.
///
/// A zero TTL disables caching.
pub struct LookupCache {
    ttl: Duration,
    accounts: Slot<Vec<AccountRecord>>,
    tags: Slot<Vec<TagRecord>>,
}

impl LookupCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            accounts: Mutex::new(HashMap::new()),
            tags: Mutex::new(HashMap::new()),
        }
    }

    /// Wraps `source` so its tables are served from this cache.
    pub fn wrap<S: LookupSource>(
        &self,
        source: S,
        credential: impl Into<String>,
    ) -> CachedLookup<'_, S> {
        CachedLookup {
            inner: source,
            credential: credential.into(),
            cache: self,
        }
    }

    fn get_or_fetch<T, F>(
        &self,
        table: &'static str,
        slot: &Slot<T>,
        credential: &str,
        fetch: F,
    ) -> Result<T>
    where
        T: Clone,
        F: FnOnce() -> Result<T>,
    {
        if self.ttl.is_zero() {
            return fetch();
        }

        let mut entries = slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = entries.get(credential) {
            if entry.fetched_at.elapsed() < self.ttl {
                debug!(table, "lookup cache hit");
                return Ok(entry.value.clone());
            }
        }

        let value = fetch()?;
        entries.insert(
            credential.to_string(),
            Entry {
                fetched_at: Instant::now(),
                value: value.clone(),
            },
        );
        Ok(value)
    }
}

pub struct CachedLookup<'a, S> {
    inner: S,
    credential: String,
    cache: &'a LookupCache,
}

impl<S> CachedLookup<'_, S> {
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: LookupSource> LookupSource for CachedLookup<'_, S> {
    fn source_name(&self) -> &'static str {
        self.inner.source_name()
    }

    fn fetch_accounts(&self) -> Result<Vec<AccountRecord>> {
        self.cache
            .get_or_fetch("accounts", &self.cache.accounts, &self.credential, || {
                self.inner.fetch_accounts()
            })
    }

    fn fetch_tags(&self) -> Result<Vec<TagRecord>> {
        self.cache
            .get_or_fetch("tags", &self.cache.tags, &self.credential, || {
                self.inner.fetch_tags()
            })
    }
}
