use anyhow::{Context as _, Result};
use clap::Args;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tagmap_remote::snapshot::render_snapshot;

use super::{fetch_tables, open_lookup, print_json, Context};
use crate::error::invalid_input;

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Re-read an existing snapshot instead of the remote sources
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Write the snapshot here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct LookupReport {
    accounts: usize,
    tags: usize,
    output: String,
}

pub fn lookup(ctx: &Context<'_>, args: LookupArgs) -> Result<()> {
    if ctx.json && args.out.is_none() {
        return Err(invalid_input("--json requires --out for the lookup command"));
    }

    let cache = ctx.lookup_cache();
    let chain = open_lookup(ctx, &cache, args.snapshot.as_deref())?;
    let tables = fetch_tables(&chain)?;
    let data = render_snapshot(&tables)?;

    let Some(path) = args.out else {
        println!("{}", data);
        return Ok(());
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create snapshot directory {}", parent.display()))?;
        }
    }
    fs::write(&path, format!("{data}\n"))
        .with_context(|| format!("write snapshot {}", path.display()))?;

    let report = LookupReport {
        accounts: tables.accounts.len(),
        tags: tables.tags.len(),
        output: path.display().to_string(),
    };
    if ctx.json {
        print_json(&report)?;
    } else {
        println!(
            "Saved {} accounts and {} tags to {}",
            report.accounts, report.tags, report.output
        );
    }
    Ok(())
}
