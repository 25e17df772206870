//! Sync session: the top-level wiring of one mirror
//!
//! A session resolves exclusions and builds the transfer command once, runs
//! it immediately, then re-runs it on every filesystem change until an exit
//! signal arrives. Everything happens on a single event loop:
//!
//! ```text
//!   watcher ──ChangeEvent──┐
//!                          ├──> select! ──> ProcessManager::run
//!   signals ──ExitReason───┤                      │
//!                          │                 supervisor task
//!   printer <──RunEvent────┘<─────────────────────┘
//! ```

use std::future::Future;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::command::TransferCommand;
use crate::error::Result;
use crate::exclusion::Exclusions;
use crate::output::{Console, OutputPrinter, OutputSink};
use crate::process::ProcessManager;
use crate::signals::{ExitReason, ExitSignals};
use crate::state::EditState;
use crate::target::SyncTarget;
use crate::watcher::ChangeWatcher;

/// One running mirror of a source directory to a destination
#[derive(Debug)]
pub struct SyncSession<S = Console> {
    target: SyncTarget,
    command: TransferCommand,
    edit_state: EditState,
    printer: OutputPrinter<S>,
}

impl SyncSession<Console> {
    /// Session printing to the console
    pub fn new(target: SyncTarget) -> Self {
        Self::with_sink(target, Console)
    }
}

impl<S: OutputSink> SyncSession<S> {
    /// Session rendering transfer output into `sink`
    pub fn with_sink(target: SyncTarget, sink: S) -> Self {
        let exclusions = Exclusions::resolve(target.source(), target.ignore_folders());
        let command = TransferCommand::build(&target, exclusions);
        let edit_state = EditState::new();
        let printer = OutputPrinter::new(sink, edit_state.clone());

        Self {
            target,
            command,
            edit_state,
            printer,
        }
    }

    /// Adjust the transfer command before the session starts
    pub fn map_command(mut self, f: impl FnOnce(TransferCommand) -> TransferCommand) -> Self {
        self.command = f(self.command);
        self
    }

    pub fn target(&self) -> &SyncTarget {
        &self.target
    }

    pub fn command(&self) -> &TransferCommand {
        &self.command
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit_state
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn start(self) -> Result<ExitReason> {
        let mut signals = ExitSignals::install()?;
        self.run_until(async move { signals.recv().await }).await
    }

    /// Run until `shutdown` resolves.
    ///
    /// Returns an error only when the watch cannot be established; any
    /// transfer started by then is terminated first. Once `shutdown`
    /// resolves, the active transfer is terminated and reaped and no further
    /// output is rendered.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<ExitReason>
    where
        F: Future<Output = ExitReason>,
    {
        let (run_tx, mut run_rx) = mpsc::unbounded_channel();
        let (change_tx, mut change_rx) = mpsc::unbounded_channel();
        let mut processes = ProcessManager::new(run_tx);
        let invocation = self.command.invocation();

        info!(
            source = %self.target.source().display(),
            destination = %self.target.destination(),
            "Starting sync session"
        );

        processes.run(&invocation).await;

        let watcher = match ChangeWatcher::start(self.target.source(), change_tx) {
            Ok(watcher) => watcher,
            Err(e) => {
                processes.shutdown().await;
                return Err(e);
            }
        };
        debug!("Watching {}", watcher.root().display());

        tokio::pin!(shutdown);

        let reason = loop {
            tokio::select! {
                biased;

                reason = &mut shutdown => break reason,
                Some(change) = change_rx.recv() => {
                    debug!(kind = ?change.kind, paths = ?change.paths, "Change triggered sync");
                    self.edit_state.mark_edited();
                    processes.run(&invocation).await;
                }
                Some(event) = run_rx.recv() => self.printer.handle(event),
            }
        };

        info!(%reason, "Stopping sync session");
        drop(watcher);
        processes.shutdown().await;

        Ok(reason)
    }
}
