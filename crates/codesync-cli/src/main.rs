//! codesync CLI
//!
//! Watches a local directory and mirrors it to a remote host with rsync.

mod cli;
mod commands;
mod error;
mod logging;

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser};
use colored::Colorize;

use cli::{Cli, Commands, ignore_folders};
use codesync_core::DEFAULT_SETTINGS_FILE;
use error::{CliError, Result};

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("codesync v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    logging::init(cli.verbose)
        .map_err(|e| CliError::user(format!("Failed to initialize logging: {}", e)))?;
    tracing::debug!("Verbose mode enabled");

    let cwd = std::env::current_dir()?;
    let rsync_path = cli.rsync_path.as_deref();

    match cli.command {
        Some(Commands::Init {
            source: Some(source),
            destination: Some(destination),
            filename,
            ignore,
        }) => commands::run_init(
            &cwd,
            &source,
            &destination,
            &settings_path(&cwd, filename.as_deref()),
            ignore_folders(ignore),
        ),
        Some(Commands::Load { filename }) => commands::run_load(
            &cwd,
            &settings_path(&cwd, filename.as_deref()),
            rsync_path,
        ),
        Some(Commands::Init { .. }) => print_help(),
        None => match (cli.source, cli.destination) {
            (Some(source), Some(destination)) => commands::run_sync(
                &cwd,
                &source,
                &destination,
                ignore_folders(cli.ignore),
                rsync_path,
            ),
            _ => print_help(),
        },
    }
}

fn settings_path(cwd: &Path, filename: Option<&str>) -> PathBuf {
    cwd.join(filename.unwrap_or(DEFAULT_SETTINGS_FILE))
}

/// Incomplete arguments are not an error: show usage and exit cleanly
fn print_help() -> Result<()> {
    Cli::command().print_help()?;
    println!();
    Ok(())
}
