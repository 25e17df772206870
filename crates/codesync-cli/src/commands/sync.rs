//! Sync command implementation
//!
//! Runs one session in the foreground until SIGINT or SIGTERM.

use std::path::Path;

use colored::Colorize;
use codesync_core::{SyncSession, SyncTarget};

use crate::error::Result;

/// Resolve the target against `cwd` and sync it until told to stop
pub fn run_sync(
    cwd: &Path,
    source: &str,
    destination: &str,
    ignore_folders: Vec<String>,
    rsync_path: Option<&str>,
) -> Result<()> {
    let target = SyncTarget::resolve(cwd, source, destination, ignore_folders)?;
    run_target(target, rsync_path)
}

/// Sync an already resolved target
pub(crate) fn run_target(target: SyncTarget, rsync_path: Option<&str>) -> Result<()> {
    println!(
        "{} Syncing {} to {}",
        "=>".blue().bold(),
        target.source().display().to_string().cyan(),
        target.destination().cyan()
    );

    let mut session = SyncSession::new(target);
    if let Some(program) = rsync_path {
        session = session.map_command(|c| c.with_program(program, Vec::<String>::new()));
    }
    tracing::debug!("Transfer command: {}", session.command());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let reason = runtime.block_on(session.start())?;

    tracing::info!(%reason, "Sync stopped");
    Ok(())
}
