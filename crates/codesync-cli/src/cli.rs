//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};

/// codesync - Continuously sync a local directory to a remote host with rsync
#[derive(Parser, Debug)]
#[command(name = "codesync")]
#[command(about, long_about = None, disable_version_flag = true)]
#[command(args_conflicts_with_subcommands = true)]
#[command(after_help = "Examples:
  codesync ./src user@server:/app
  codesync . deploy@10.0.0.5:2222:/srv/app --ignore node_modules,dist
  codesync init ./src user@server:/app
  codesync load")]
pub struct Cli {
    /// Print version information
    #[arg(short = 'v', long, global = true)]
    pub version: bool,

    /// Enable verbose output
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Transfer program to run instead of `rsync`
    #[arg(long, value_name = "PROGRAM", global = true)]
    pub rsync_path: Option<String>,

    /// Local directory to sync
    pub source: Option<String>,

    /// Destination, as [user@]host[:port]:path
    pub destination: Option<String>,

    /// Folder names to exclude, comma-separated
    #[arg(long, value_delimiter = ',', value_name = "FOLDERS")]
    pub ignore: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Save a source/destination pair to a settings file
    Init {
        /// Local directory to sync
        source: Option<String>,

        /// Destination, as [user@]host[:port]:path
        destination: Option<String>,

        /// Settings file to write (default: .codesync.json)
        filename: Option<String>,

        /// Folder names to exclude, comma-separated
        #[arg(long, value_delimiter = ',', value_name = "FOLDERS")]
        ignore: Vec<String>,
    },

    /// Start syncing with the settings saved by `init`
    Load {
        /// Settings file to read (default: .codesync.json)
        filename: Option<String>,
    },
}

/// Trim `--ignore` entries and drop empty ones
pub fn ignore_folders(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
