//! Command implementations for codesync-cli

pub mod init;
pub mod load;
pub mod sync;

pub use init::run_init;
pub use load::run_load;
pub use sync::run_sync;

use colored::Colorize;
use codesync_core::Settings;

/// Print the fields of a settings record
fn print_settings(settings: &Settings) {
    println!("   Source: {}", settings.source.cyan());
    println!("   Destination: {}", settings.destination.cyan());
    if !settings.ignore_folders.is_empty() {
        println!(
            "   Ignore folders: {}",
            settings.ignore_folders.join(", ").yellow()
        );
    }
}
