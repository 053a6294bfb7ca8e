//! # gnucash-asx-fetch
//!
//! Program to fetch current ASX share prices and add them to one or more GnuCash
//! XML books.
//!
//! Only commodities that already have at least one ASX price record in a book get
//! a new one. Meant to be run from cron or a systemd timer.

mod error;
mod file;
mod fraction;
mod patch;
mod quote;
mod record;
mod walk;

use std::process::ExitCode;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use crate::file::{Options, Run};
use crate::quote::YahooQuotes;

/// Fetch and add current ASX share prices to one or more GnuCash XML files
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Silently ignore any files currently open
    #[arg(short, long)]
    pub ignore_open: bool,
    /// Suppress message output
    #[arg(short, long)]
    pub quiet: bool,
    /// Do not update any file[s]
    #[arg(short, long)]
    pub dry_run: bool,
    /// Directories or files to update
    #[arg(required = true)]
    pub path: Vec<std::path::PathBuf>,
}

/// Messages go to stderr. `--quiet` leaves only errors; RUST_LOG wins over both.
fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn main() -> ExitCode {
    let args = Cli::parse();
    init_logging(args.quiet);

    let stamp = record::run_timestamp();

    let source = match YahooQuotes::new() {
        Ok(source) => source,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };

    let options = Options { ignore_open: args.ignore_open, dry_run: args.dry_run };
    let mut run = Run::new(options, source, stamp);

    // Every path is tried even after a failure
    let mut ok = true;
    for path in &args.path {
        if !walk::process_path(path, &mut run) {
            ok = false;
        }
    }

    if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}
