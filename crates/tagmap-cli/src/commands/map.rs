use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tagmap_config::CollisionPolicy;
use tagmap_core::{map_upload, KeyCollision, Mapping, TagMatching};
use tracing::warn;

use super::{fetch_tables, open_lookup, print_json, Context, DEFAULT_MAPPED_FILE};
use crate::error::invalid_input;
use crate::table::{parse_delimiter, read_upload, write_csv, UploadFormat, MAPPED_HEADERS};

#[derive(Debug, Args)]
pub struct UploadArgs {
    /// CSV file with one email/tag pair per row
    pub input: PathBuf,
    /// Header of the email column (default: first column)
    #[arg(long)]
    pub email_column: Option<String>,
    /// Header of the tag column (default: second column)
    #[arg(long)]
    pub tag_column: Option<String>,
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    pub delimiter: u8,
    /// Match tag names ignoring case
    #[arg(long)]
    pub case_insensitive_tags: bool,
}

impl UploadArgs {
    fn format(&self) -> UploadFormat<'_> {
        UploadFormat {
            delimiter: self.delimiter,
            email_column: self.email_column.as_deref(),
            tag_column: self.tag_column.as_deref(),
        }
    }

    fn matching(&self, ctx: &Context<'_>) -> TagMatching {
        if self.case_insensitive_tags {
            TagMatching::CaseInsensitive
        } else {
            ctx.config.apply.tag_matching
        }
    }
}

#[derive(Debug, Args)]
pub struct LookupOptions {
    /// Read lookup tables from a snapshot file instead of the remote sources
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Fail when two remote records share a normalized key
    #[arg(long)]
    pub strict_keys: bool,
}

impl LookupOptions {
    fn policy(&self, ctx: &Context<'_>) -> CollisionPolicy {
        if self.strict_keys {
            CollisionPolicy::Reject
        } else {
            ctx.config.lookup.collisions
        }
    }
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub upload: UploadArgs,
    #[command(flatten)]
    pub lookup: LookupOptions,
    #[arg(long, default_value = DEFAULT_MAPPED_FILE)]
    pub out: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct MapReport {
    pub rows: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub account_collisions: usize,
    pub tag_collisions: usize,
    pub output: Option<String>,
}

impl MapReport {
    pub fn new(mapping: &Mapping, output: Option<&Path>) -> Self {
        let resolved = mapping.resolved_count();
        Self {
            rows: mapping.rows.len(),
            resolved,
            unresolved: mapping.rows.len() - resolved,
            account_collisions: mapping.account_collisions.len(),
            tag_collisions: mapping.tag_collisions.len(),
            output: output.map(|path| path.display().to_string()),
        }
    }
}

pub fn map(ctx: &Context<'_>, args: MapArgs) -> Result<()> {
    let mapping = build_mapping(ctx, &args.upload, &args.lookup)?;
    write_mapping(&args.out, &mapping)?;
    let report = MapReport::new(&mapping, Some(&args.out));
    if ctx.json {
        return print_json(&report);
    }
    print_map_report(&report);
    Ok(())
}

/// Reads the upload, fetches the lookup tables and joins them. The upload
/// is parsed before any network call so a bad file fails fast.
pub fn build_mapping(
    ctx: &Context<'_>,
    upload_args: &UploadArgs,
    lookup: &LookupOptions,
) -> Result<Mapping> {
    let upload = read_upload(&upload_args.input, upload_args.format())?;
    if upload.is_empty() {
        warn!(path = %upload_args.input.display(), "upload has no data rows");
    }

    let cache = ctx.lookup_cache();
    let chain = open_lookup(ctx, &cache, lookup.snapshot.as_deref())?;
    let tables = fetch_tables(&chain)?;
    let mapping = map_upload(
        &upload,
        &tables.accounts,
        &tables.tags,
        upload_args.matching(ctx),
    );
    check_collisions(&mapping, lookup.policy(ctx))?;
    Ok(mapping)
}

pub fn write_mapping(path: &Path, mapping: &Mapping) -> Result<()> {
    write_csv(path, &MAPPED_HEADERS, &mapping.records())
}

pub fn print_map_report(report: &MapReport) {
    println!(
        "Mapped {} rows: {} resolved, {} unresolved",
        report.rows, report.resolved, report.unresolved
    );
    if report.account_collisions > 0 || report.tag_collisions > 0 {
        println!(
            "Duplicate lookup keys: {} account, {} tag (last record wins)",
            report.account_collisions, report.tag_collisions
        );
    }
    if let Some(output) = &report.output {
        println!("Wrote {}", output);
    }
}

fn check_collisions(mapping: &Mapping, policy: CollisionPolicy) -> Result<()> {
    log_collisions("account", &mapping.account_collisions);
    log_collisions("tag", &mapping.tag_collisions);
    if policy == CollisionPolicy::Reject && mapping.has_collisions() {
        return Err(invalid_input(format!(
            "duplicate lookup keys: {} account, {} tag",
            mapping.account_collisions.len(),
            mapping.tag_collisions.len()
        )));
    }
    Ok(())
}

fn log_collisions<Id: Display>(table: &'static str, collisions: &[KeyCollision<Id>]) {
    for collision in collisions {
        let ids = collision
            .ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        warn!(table, key = %collision.key, ids = %ids, "duplicate lookup key");
    }
}
