//! Init command implementation

use std::path::Path;

use colored::Colorize;
use codesync_core::{DEFAULT_SETTINGS_FILE, Settings};

use super::print_settings;
use crate::error::Result;

/// Save settings for `source` and `destination` to `path`
pub fn run_init(
    cwd: &Path,
    source: &str,
    destination: &str,
    path: &Path,
    ignore_folders: Vec<String>,
) -> Result<()> {
    let settings = Settings::new(cwd, source, destination, ignore_folders);
    settings.save(path)?;

    println!(
        "{} Settings saved to {}",
        "OK".green().bold(),
        path.display().to_string().cyan()
    );
    print_settings(&settings);

    println!();
    println!("Run {} to start syncing.", load_hint(path).cyan());
    Ok(())
}

fn load_hint(path: &Path) -> String {
    match path.file_name().and_then(|n| n.to_str()) {
        Some(DEFAULT_SETTINGS_FILE) | None => "codesync load".to_string(),
        Some(name) => format!("codesync load {}", name),
    }
}
