use anyhow::{Context as _, Result};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tagmap_config::{AppConfig, LookupSourceKind};
use tagmap_remote::cache::LookupCache;
use tagmap_remote::client::HttpSettings;
use tagmap_remote::graphql::GraphqlSource;
use tagmap_remote::rest::RestSource;
use tagmap_remote::snapshot::SnapshotSource;
use tagmap_remote::{LookupChain, LookupTables};
use tracing::debug;

use crate::error::not_found;

pub mod apply;
pub mod completions;
pub mod lookup;
pub mod map;
pub mod run;

pub const DEFAULT_MAPPED_FILE: &str = "mapped_emails_tags.csv";
pub const DEFAULT_RESULTS_FILE: &str = "smartlead_tag_apply_results.csv";

pub struct Context<'a> {
    pub json: bool,
    pub config: &'a AppConfig,
}

impl Context<'_> {
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            timeout: Duration::from_secs(self.config.apply.timeout_secs),
            ..HttpSettings::default()
        }
    }

    pub fn lookup_cache(&self) -> LookupCache {
        LookupCache::new(Duration::from_secs(self.config.lookup.cache_ttl_secs))
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}

/// Builds the lookup chain for this run. A snapshot replaces the configured
/// remote sources entirely and needs no credentials; otherwise every
/// configured source must have its credential before anything is fetched.
pub fn open_lookup<'c>(
    ctx: &Context<'_>,
    cache: &'c LookupCache,
    snapshot: Option<&Path>,
) -> Result<LookupChain<'c>> {
    let mut chain = LookupChain::default();
    if let Some(path) = snapshot {
        if !path.is_file() {
            return Err(not_found(format!("snapshot {}", path.display())));
        }
        let source = SnapshotSource::open(path)
            .with_context(|| format!("read snapshot {}", path.display()))?;
        chain.push(Box::new(source));
        return Ok(chain);
    }

    let config = ctx.config;
    let settings = ctx.http_settings();
    for kind in &config.lookup.sources {
        match kind {
            LookupSourceKind::Graphql => {
                let bearer = config.credentials.require_bearer()?;
                let source = GraphqlSource::new(
                    &config.endpoints.graphql_url,
                    bearer.to_string(),
                    &settings,
                )?;
                chain.push(Box::new(cache.wrap(source, format!("graphql:{bearer}"))));
            }
            LookupSourceKind::Rest => {
                let api_key = config.credentials.require_api_key()?;
                let source = RestSource::new(
                    &config.endpoints.rest_accounts_url,
                    &config.endpoints.rest_tags_url,
                    api_key.to_string(),
                    &settings,
                )?;
                chain.push(Box::new(cache.wrap(source, format!("rest:{api_key}"))));
            }
        }
        debug!(source = kind.as_str(), "lookup source configured");
    }
    Ok(chain)
}

pub fn fetch_tables(chain: &LookupChain<'_>) -> Result<LookupTables> {
    LookupTables::fetch(chain).with_context(|| "fetch lookup tables")
}
