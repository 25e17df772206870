//! Exit signal handling
//!
//! Listeners are registered once, when a session starts, and stay
//! registered for its whole lifetime.

use std::fmt;

use crate::error::Result;

/// Why the session is shutting down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Interrupt (Ctrl+C / SIGINT)
    Interrupt,
    /// Termination request (SIGTERM)
    Terminate,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "interrupt"),
            Self::Terminate => write!(f, "terminate"),
        }
    }
}

/// Registered interrupt and termination listeners
#[derive(Debug)]
pub struct ExitSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ExitSignals {
    /// Register the listeners. Must be called from within a tokio runtime.
    pub fn install() -> Result<Self> {
        #[cfg(unix)]
        {
            use crate::error::Error;
            use tokio::signal::unix::{SignalKind, signal};

            let interrupt = signal(SignalKind::interrupt()).map_err(Error::Signal)?;
            let terminate = signal(SignalKind::terminate()).map_err(Error::Signal)?;
            Ok(Self {
                interrupt,
                terminate,
            })
        }
        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next exit signal
    pub async fn recv(&mut self) -> ExitReason {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = self.interrupt.recv() => ExitReason::Interrupt,
                _ = self.terminate.recv() => ExitReason::Terminate,
            }
        }
        #[cfg(not(unix))]
        {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Interrupt listener failed: {}", e);
            }
            ExitReason::Interrupt
        }
    }
}
