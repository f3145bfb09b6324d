use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use super::apply::{apply_stage, print_apply_output, ApplyOptions, ApplyOutput};
use super::map::{
    build_mapping, print_map_report, write_mapping, LookupOptions, MapReport, UploadArgs,
};
use super::{print_json, Context};

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub upload: UploadArgs,
    #[command(flatten)]
    pub lookup: LookupOptions,
    /// Also keep the mapped CSV
    #[arg(long)]
    pub mapped_out: Option<PathBuf>,
    #[command(flatten)]
    pub apply: ApplyOptions,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    mapping: MapReport,
    apply: ApplyOutput<'a>,
}

pub fn run(ctx: &Context<'_>, args: RunArgs) -> Result<()> {
    if !args.apply.is_dry_run(ctx.config) {
        ctx.config.credentials.require_api_key()?;
    }
    let mapping = build_mapping(ctx, &args.upload, &args.lookup)?;
    if let Some(path) = &args.mapped_out {
        write_mapping(path, &mapping)?;
    }
    let map_report = MapReport::new(&mapping, args.mapped_out.as_deref());

    let report = apply_stage(ctx, &mapping, &args.apply)?;
    let apply_output = ApplyOutput::new(&report.summary, &args.apply);
    if ctx.json {
        return print_json(&RunReport {
            mapping: map_report,
            apply: apply_output,
        });
    }
    print_map_report(&map_report);
    print_apply_output(&apply_output);
    Ok(())
}
