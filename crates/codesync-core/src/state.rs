//! Session-owned edit flag

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether any filesystem change has been seen in this session
///
/// Starts false and latches to true on the first change; it is never reset.
/// Clones share the same flag, so the session can hand one to the output
/// printer and flip it from the watcher branch of its event loop.
#[derive(Debug, Clone, Default)]
pub struct EditState(Arc<AtomicBool>);

impl EditState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_edited(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_edited(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
