use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative cancellation shared between a host and running sessions.
///
/// Detection kills running external programs and discards in-flight
/// results once cancelled; application stops
/// after the decision in progress; the final write is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// The shared flag, for code below this crate that only polls it.
    pub(crate) fn flag(&self) -> &AtomicBool {
        &self.0
    }
}
