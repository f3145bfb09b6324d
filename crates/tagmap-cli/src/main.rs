mod commands;
mod error;
mod table;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

use crate::commands::{apply, completions, lookup, map, run, Context};
use crate::error::{exit_code_for, report_error};
use tagmap_config as config;

#[derive(Debug, Parser)]
#[command(name = "tagmap", version, about = "Map spreadsheet email/tag pairs and apply tags")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve a CSV of email/tag pairs against the remote lookup tables
    Map(map::MapArgs),
    /// Apply tags from a mapped CSV
    Apply(apply::ApplyArgs),
    /// Map and apply in one go
    Run(run::RunArgs),
    /// Fetch the remote lookup tables
    Lookup(lookup::LookupArgs),
    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    init_logging(verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err, verbose);
            exit_code_for(&err)
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let Cli {
        config: config_path,
        json,
        verbose,
        command,
    } = cli;

    match command {
        Command::Completions(args) => completions::emit(args),
        command => {
            let app_config = config::load(config_path.clone()).with_context(|| "load config")?;
            if verbose {
                match config::resolve_config_path(config_path) {
                    Ok(path) => {
                        if path.exists() {
                            debug!(path = %path.display(), "config resolved");
                        } else {
                            debug!(path = %path.display(), "config missing, using defaults");
                        }
                    }
                    Err(err) => {
                        debug!(error = %err, "config unavailable");
                    }
                }
                debug!(config = ?app_config, "effective config");
            }

            let ctx = Context {
                json,
                config: &app_config,
            };

            match command {
                Command::Map(args) => map::map(&ctx, args),
                Command::Apply(args) => apply::apply(&ctx, args),
                Command::Run(args) => run::run(&ctx, args),
                Command::Lookup(args) => lookup::lookup(&ctx, args),
                Command::Completions(_) => {
                    unreachable!("completions command handled before config load")
                }
            }
        }
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
