use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tagmap_config::AppConfig;
use tagmap_core::{apply_mapping, validate_batch_size, ApplyMode, ApplyReport, Mapping, Summary};
use tagmap_remote::applier::HttpTagApplier;
use tracing::{debug, warn};

use super::{print_json, Context, DEFAULT_MAPPED_FILE, DEFAULT_RESULTS_FILE};
use crate::table::{read_mapped, CsvOutput, BATCH_LOG_HEADERS, RESULT_HEADERS};

#[derive(Debug, Args)]
pub struct ApplyOptions {
    /// Send the tag batches (default comes from config)
    #[arg(long, conflicts_with = "dry_run")]
    pub live: bool,
    /// Plan the batches without sending them
    #[arg(long)]
    pub dry_run: bool,
    /// Emails per request, 1 to 25
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long, default_value = DEFAULT_RESULTS_FILE)]
    pub out: PathBuf,
    /// Also write one line per batch to this file
    #[arg(long)]
    pub batch_log: Option<PathBuf>,
}

impl ApplyOptions {
    pub fn is_dry_run(&self, config: &AppConfig) -> bool {
        if self.live {
            false
        } else {
            self.dry_run || config.apply.dry_run
        }
    }
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Mapped CSV produced by `tagmap map`
    #[arg(default_value = DEFAULT_MAPPED_FILE)]
    pub mapped: PathBuf,
    #[command(flatten)]
    pub options: ApplyOptions,
}

#[derive(Debug, Serialize)]
pub struct ApplyOutput<'a> {
    pub summary: &'a Summary,
    pub results: String,
    pub batch_log: Option<String>,
}

impl<'a> ApplyOutput<'a> {
    pub fn new(summary: &'a Summary, options: &ApplyOptions) -> Self {
        Self {
            summary,
            results: display(&options.out),
            batch_log: options.batch_log.as_deref().map(display),
        }
    }
}

pub fn apply(ctx: &Context<'_>, args: ApplyArgs) -> Result<()> {
    let mapping = Mapping::from_records(read_mapped(&args.mapped)?);
    let report = apply_stage(ctx, &mapping, &args.options)?;
    let output = ApplyOutput::new(&report.summary, &args.options);
    if ctx.json {
        return print_json(&output);
    }
    print_apply_output(&output);
    Ok(())
}

/// Plans and dispatches the batches, then fills in the results file and the
/// optional batch log. Both files and the API key of a live run are in
/// place before anything is sent.
pub fn apply_stage(
    ctx: &Context<'_>,
    mapping: &Mapping,
    options: &ApplyOptions,
) -> Result<ApplyReport> {
    let requested = options.batch_size.unwrap_or(ctx.config.apply.batch_size);
    let batch_size = validate_batch_size(requested)?;
    let progress = |done: usize, total: usize| debug!(done, total, "batch dispatched");

    let live_key = if options.is_dry_run(ctx.config) {
        None
    } else {
        Some(ctx.config.credentials.require_api_key()?)
    };
    let results = CsvOutput::create(&options.out, &RESULT_HEADERS)?;
    let batch_log = options
        .batch_log
        .as_deref()
        .map(|path| CsvOutput::create(path, &BATCH_LOG_HEADERS))
        .transpose()?;

    let report = if let Some(api_key) = live_key {
        let applier = HttpTagApplier::new(
            &ctx.config.endpoints.tag_mapping_url,
            api_key,
            &ctx.http_settings(),
        )?;
        debug!(batch_size, "live run");
        apply_mapping(mapping, batch_size, ApplyMode::Live(&applier), progress)?
    } else {
        debug!(batch_size, "dry run");
        apply_mapping(mapping, batch_size, ApplyMode::DryRun, progress)?
    };

    results.finish(&report.rows)?;
    if let Some(batch_log) = batch_log {
        batch_log.finish(&report.batches)?;
    }
    if report.summary.errors > 0 {
        warn!(
            errors = report.summary.errors,
            "some batches failed; see the results file"
        );
    }
    Ok(report)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

pub fn print_apply_output(output: &ApplyOutput<'_>) {
    let summary = output.summary;
    if summary.dry_run {
        println!("Dry run: nothing was sent.");
        println!("Would apply: {}", summary.applied);
    } else {
        println!("Applied: {}", summary.applied);
    }
    println!("Skipped (no account): {}", summary.skipped_accounts);
    println!("Skipped (no tag): {}", summary.skipped_tags);
    println!("Skipped (no account and tag): {}", summary.skipped_both);
    println!("Errors: {}", summary.errors);
    println!("Rows: {} in {} batches", summary.total_rows, summary.total_batches);
    println!("Results written to {}", output.results);
    if let Some(path) = &output.batch_log {
        println!("Batch log written to {}", path);
    }
}
