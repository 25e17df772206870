//! Load command implementation

use std::path::Path;

use colored::Colorize;
use codesync_core::Settings;

use super::print_settings;
use super::sync::run_target;
use crate::error::Result;

/// Load settings from `path` and start syncing
///
/// The stored source is resolved against `cwd`, the directory `load` runs in.
pub fn run_load(cwd: &Path, path: &Path, rsync_path: Option<&str>) -> Result<()> {
    let settings = Settings::load(path)?;

    println!(
        "{} Loaded settings from {}",
        "=>".blue().bold(),
        path.display().to_string().cyan()
    );
    print_settings(&settings);

    let target = settings.target(cwd)?;
    run_target(target, rsync_path)
}
