//! Transfer process lifecycle
//!
//! The [`ProcessManager`] owns at most one running transfer. Starting a new
//! run always cancels and reaps the previous one first, so two transfers
//! never write to the same destination at once. Each spawned process is
//! driven by a supervisor task that streams its output back to the session
//! as [`RunEvent`]s over a channel.

use std::fmt;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::command::Invocation;

/// How long a transfer gets to exit after SIGTERM before it is killed
pub const TERMINATE_GRACE: Duration = Duration::from_secs(3);

/// Identifier of one transfer run within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunId(pub(crate) u64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Process exited with status 0
    Success,
    /// Process exited unsuccessfully; `code` is `None` when killed by a signal
    Failed { code: Option<i32> },
    /// Process was cancelled by the session
    Terminated,
}

/// Something a running transfer reported
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    /// A chunk of standard output, normally one line including its newline
    Output { run: RunId, chunk: String },
    /// A chunk of standard error
    Diagnostic { run: RunId, chunk: String },
    /// The process could not be started at all
    SpawnFailed { run: RunId, message: String },
    /// The process is gone
    Finished { run: RunId, status: RunStatus },
}

impl RunEvent {
    pub fn run(&self) -> RunId {
        match self {
            Self::Output { run, .. }
            | Self::Diagnostic { run, .. }
            | Self::SpawnFailed { run, .. }
            | Self::Finished { run, .. } => *run,
        }
    }
}

/// Ownership of one in-flight transfer process
///
/// Dropping the handle terminates the process.
#[derive(Debug)]
pub struct RunHandle {
    id: RunId,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RunHandle {
    pub fn id(&self) -> RunId {
        self.id
    }

    /// Request termination of the process.
    ///
    /// Idempotent: calling this on a handle whose process already exited,
    /// or which was already terminated, does nothing.
    pub fn terminate(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            if cancel.send(()).is_ok() {
                debug!(run = %self.id, "Termination requested");
            }
        }
    }

    /// Whether the supervisor has finished (process exited and reaped)
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Wait until the process has exited and been reaped
    pub async fn wait(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(run = %self.id, "Transfer supervisor failed: {}", e);
            }
        }
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Starts transfers and tracks the one currently running
#[derive(Debug)]
pub struct ProcessManager {
    events: mpsc::UnboundedSender<RunEvent>,
    active: Option<RunHandle>,
    next_id: u64,
}

impl ProcessManager {
    /// Create a manager reporting every run's events on `events`
    pub fn new(events: mpsc::UnboundedSender<RunEvent>) -> Self {
        Self {
            events,
            active: None,
            next_id: 0,
        }
    }

    /// Start a new run of `invocation`.
    ///
    /// Any active run is terminated and reaped before the new process is
    /// spawned. A spawn failure is reported as [`RunEvent::SpawnFailed`]
    /// rather than returned: a broken transfer never ends the session.
    pub async fn run(&mut self, invocation: &Invocation) -> RunId {
        if let Some(mut previous) = self.active.take() {
            if !previous.is_finished() {
                debug!(run = %previous.id(), "Cancelling superseded transfer");
            }
            previous.terminate();
            previous.wait().await;
        }

        self.next_id += 1;
        let id = RunId(self.next_id);
        debug!(run = %id, "Starting transfer: {}", invocation);

        match invocation.to_command().spawn() {
            Ok(child) => {
                let (cancel_tx, cancel_rx) = oneshot::channel();
                let task = tokio::spawn(supervise(id, child, cancel_rx, self.events.clone()));
                self.active = Some(RunHandle {
                    id,
                    cancel: Some(cancel_tx),
                    task: Some(task),
                });
            }
            Err(e) => {
                warn!(run = %id, "Failed to start transfer: {}", e);
                let _ = self.events.send(RunEvent::SpawnFailed {
                    run: id,
                    message: format!(
                        "failed to start {}: {}",
                        invocation.program().to_string_lossy(),
                        e
                    ),
                });
            }
        }

        id
    }

    /// Handle of the most recently started run, if it was spawned
    pub fn active(&self) -> Option<&RunHandle> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut RunHandle> {
        self.active.as_mut()
    }

    /// Request termination of the active run without waiting for it
    pub fn terminate_active(&mut self) {
        if let Some(handle) = self.active.as_mut() {
            handle.terminate();
        }
    }

    /// Terminate the active run and wait until its process is reaped
    pub async fn shutdown(&mut self) {
        if let Some(mut handle) = self.active.take() {
            handle.terminate();
            handle.wait().await;
            debug!(run = %handle.id(), "Transfer shut down");
        }
    }
}

impl Drop for ProcessManager {
    fn drop(&mut self) {
        self.terminate_active();
    }
}

/// Reads lossy UTF-8 chunks up to and including each newline
struct ChunkReader<R> {
    reader: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    fn new(inner: R) -> Self {
        Self {
            reader: BufReader::new(inner),
            buf: Vec::new(),
        }
    }

    async fn next_chunk(&mut self) -> std::io::Result<Option<String>> {
        self.buf.clear();
        let read = self.reader.read_until(b'\n', &mut self.buf).await?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&self.buf).into_owned()))
    }
}

/// Next chunk of a stream, closing it (`None`) on EOF or read error
async fn next_chunk<R: AsyncRead + Unpin>(stream: &mut Option<ChunkReader<R>>) -> Option<String> {
    let reader = stream.as_mut()?;
    match reader.next_chunk().await {
        Ok(Some(chunk)) => Some(chunk),
        Ok(None) => {
            *stream = None;
            None
        }
        Err(e) => {
            debug!("Transfer output stream closed: {}", e);
            *stream = None;
            None
        }
    }
}

/// Stop a transfer, letting it clean up if it cooperates.
///
/// SIGTERM first, so rsync can shut down its own ssh child; SIGKILL only if
/// the process is still there after [`TERMINATE_GRACE`].
async fn terminate_child(id: RunId, child: &mut Child) {
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            let sent = tokio::process::Command::new("kill")
                .args(["-TERM", &pid.to_string()])
                .stdin(std::process::Stdio::null())
                .stdout(std::process::Stdio::null())
                .stderr(std::process::Stdio::null())
                .status()
                .await;

            match sent {
                Ok(status) if status.success() => {
                    if tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok() {
                        return;
                    }
                    debug!(run = %id, "Transfer still running after SIGTERM, killing");
                }
                Ok(_) => {}
                Err(e) => debug!(run = %id, "Failed to send SIGTERM: {}", e),
            }
        }
    }

    if let Err(e) = child.kill().await {
        debug!(run = %id, "Kill failed, process already gone: {}", e);
    }
}

async fn supervise(
    id: RunId,
    mut child: Child,
    mut cancel: oneshot::Receiver<()>,
    events: mpsc::UnboundedSender<RunEvent>,
) {
    let mut stdout = child.stdout.take().map(ChunkReader::new);
    let mut stderr = child.stderr.take().map(ChunkReader::new);

    let status = loop {
        tokio::select! {
            biased;

            // Also fires when the handle is dropped
            _ = &mut cancel => {
                terminate_child(id, &mut child).await;
                break RunStatus::Terminated;
            }
            chunk = next_chunk(&mut stdout), if stdout.is_some() => {
                if let Some(chunk) = chunk {
                    let _ = events.send(RunEvent::Output { run: id, chunk });
                }
            }
            chunk = next_chunk(&mut stderr), if stderr.is_some() => {
                if let Some(chunk) = chunk {
                    let _ = events.send(RunEvent::Diagnostic { run: id, chunk });
                }
            }
            result = child.wait(), if stdout.is_none() && stderr.is_none() => {
                break match result {
                    Ok(status) if status.success() => RunStatus::Success,
                    Ok(status) => RunStatus::Failed { code: status.code() },
                    Err(e) => {
                        warn!(run = %id, "Failed to wait for transfer: {}", e);
                        RunStatus::Failed { code: None }
                    }
                };
            }
        }
    };

    debug!(run = %id, ?status, "Transfer finished");
    let _ = events.send(RunEvent::Finished { run: id, status });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Whether `pid` is a live, not yet exited process
    fn is_alive(pid: u32) -> bool {
        let proc_dir = std::path::Path::new("/proc");
        if proc_dir.join("self").exists() {
            // State is the first field after the parenthesised command name
            return std::fs::read_to_string(proc_dir.join(pid.to_string()).join("stat"))
                .is_ok_and(|stat| {
                    stat.rsplit(')')
                        .next()
                        .is_some_and(|rest| !rest.trim_start().starts_with('Z'))
                });
        }
        std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }

    async fn wait_until_gone(pid: u32) -> bool {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while is_alive(pid) {
            if tokio::time::Instant::now() > deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        true
    }

    fn sh(script: &str) -> Invocation {
        Invocation::new("sh", ["-c", script])
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<RunEvent>) -> RunEvent {
        timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for run event")
            .expect("event channel closed")
    }

    /// Collect events until `run` reports a terminal event
    async fn collect_run(rx: &mut mpsc::UnboundedReceiver<RunEvent>, run: RunId) -> Vec<RunEvent> {
        let mut events = Vec::new();
        loop {
            let event = next_event(rx).await;
            if event.run() != run {
                continue;
            }
            let done = matches!(
                event,
                RunEvent::Finished { .. } | RunEvent::SpawnFailed { .. }
            );
            events.push(event);
            if done {
                return events;
            }
        }
    }

    #[tokio::test]
    async fn test_run_streams_output_and_exit_code() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let run = manager.run(&sh("echo src/a.txt; echo oops >&2; exit 3")).await;
        let events = collect_run(&mut rx, run).await;

        assert!(events.contains(&RunEvent::Output {
            run,
            chunk: "src/a.txt\n".to_string()
        }));
        assert!(events.contains(&RunEvent::Diagnostic {
            run,
            chunk: "oops\n".to_string()
        }));
        assert_eq!(
            events.last(),
            Some(&RunEvent::Finished {
                run,
                status: RunStatus::Failed { code: Some(3) }
            })
        );
    }

    #[tokio::test]
    async fn test_successful_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let run = manager.run(&sh("true")).await;
        let events = collect_run(&mut rx, run).await;

        assert_eq!(
            events,
            vec![RunEvent::Finished {
                run,
                status: RunStatus::Success
            }]
        );
    }

    #[tokio::test]
    async fn test_new_run_cancels_previous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let first = manager.run(&sh("sleep 30")).await;
        let second = manager.run(&sh("echo done/")).await;

        assert_ne!(first, second);
        let first_events = collect_run(&mut rx, first).await;
        assert_eq!(
            first_events.last(),
            Some(&RunEvent::Finished {
                run: first,
                status: RunStatus::Terminated
            })
        );
        assert_eq!(manager.active().map(RunHandle::id), Some(second));
    }

    #[tokio::test]
    async fn test_terminate_twice_is_noop() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let run = manager.run(&sh("true")).await;
        collect_run(&mut rx, run).await;

        let handle = manager.active_mut().unwrap();
        handle.terminate();
        handle.terminate();
        handle.wait().await;
        handle.wait().await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported_not_returned() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let run = manager
            .run(&Invocation::new("/nonexistent/codesync-rsync", ["-avuz"]))
            .await;
        let events = collect_run(&mut rx, run).await;

        match &events[..] {
            [RunEvent::SpawnFailed { message, .. }] => {
                assert!(message.contains("/nonexistent/codesync-rsync"));
            }
            other => panic!("expected a single SpawnFailed, got {:?}", other),
        }
        assert!(manager.active().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_terminates_active_run() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let run = manager.run(&sh("sleep 30")).await;
        manager.shutdown().await;

        assert!(manager.active().is_none());
        let events = collect_run(&mut rx, run).await;
        assert_eq!(
            events.last(),
            Some(&RunEvent::Finished {
                run,
                status: RunStatus::Terminated
            })
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_output_is_lossy_not_fatal() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let run = manager.run(&sh("printf 'bad\\377name/\\n'; echo after/")).await;
        let events = collect_run(&mut rx, run).await;

        let outputs: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Output { chunk, .. } => Some(chunk.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[0].contains('\u{FFFD}'));
        assert_eq!(outputs[1], "after/\n");
    }

    #[tokio::test]
    async fn test_shutdown_lets_transfer_stop_its_children() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        // Like rsync with its ssh child: cleans up the child on SIGTERM
        let run = manager
            .run(&sh("trap 'kill $c; exit 143' TERM; sleep 300 & c=$!; echo $c; wait"))
            .await;
        let grandchild = match next_event(&mut rx).await {
            RunEvent::Output { chunk, .. } => chunk.trim().parse::<u32>().unwrap(),
            other => panic!("expected the child pid, got {:?}", other),
        };

        manager.shutdown().await;

        assert!(
            wait_until_gone(grandchild).await,
            "process {} outlived the transfer",
            grandchild
        );
        let events = collect_run(&mut rx, run).await;
        assert_eq!(
            events.last(),
            Some(&RunEvent::Finished {
                run,
                status: RunStatus::Terminated
            })
        );
    }

    #[tokio::test]
    async fn test_shutdown_kills_transfer_ignoring_sigterm() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut manager = ProcessManager::new(tx);

        let run = manager
            .run(&sh("trap '' TERM; echo $$; while :; do sleep 1; done"))
            .await;
        let pid = match next_event(&mut rx).await {
            RunEvent::Output { chunk, .. } => chunk.trim().parse::<u32>().unwrap(),
            other => panic!("expected the transfer pid, got {:?}", other),
        };

        let started = tokio::time::Instant::now();
        manager.shutdown().await;

        assert!(started.elapsed() >= TERMINATE_GRACE);
        assert!(started.elapsed() < TERMINATE_GRACE + Duration::from_secs(5));
        assert!(wait_until_gone(pid).await);
        let events = collect_run(&mut rx, run).await;
        assert_eq!(
            events.last(),
            Some(&RunEvent::Finished {
                run,
                status: RunStatus::Terminated
            })
        );
    }
}
