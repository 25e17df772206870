//! Continuous one-way sync of a local directory to an rsync destination
//!
//! Runs rsync over ssh once at startup, then again on every filesystem
//! change under the source, until the process is told to exit.

pub mod command;
pub mod error;
pub mod exclusion;
pub mod output;
pub mod process;
pub mod session;
pub mod settings;
pub mod signals;
pub mod state;
pub mod target;
pub mod watcher;

pub use command::{Invocation, TransferCommand};
pub use error::{Error, Result};
pub use exclusion::{Exclusions, IGNORE_FILE_NAME};
pub use output::{Console, LineKind, OutputPrinter, OutputSink, RenderedLine, StatusMarker};
pub use process::{ProcessManager, RunEvent, RunHandle, RunId, RunStatus};
pub use session::SyncSession;
pub use settings::{DEFAULT_SETTINGS_FILE, Settings};
pub use signals::{ExitReason, ExitSignals};
pub use state::EditState;
pub use target::SyncTarget;
pub use watcher::{ChangeEvent, ChangeWatcher};
