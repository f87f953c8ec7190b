//! Cancellation tokens for the pause/resume/cancel state machine.
//!
//! Each Coordinator's currently-running attempt owns exactly one
//! [`CancelToken`]. Pause and Cancel fire it; Resume (and the initial Start)
//! replace it with a fresh one before spawning workers. Workers observe the
//! token on every read-loop iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Error used internally to unwind a chunk worker when its token fires.
#[derive(Debug)]
pub struct Cancelled;

impl std::fmt::Display for Cancelled {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "download cancelled or paused")
    }
}

impl std::error::Error for Cancelled {}

/// A single-shot cancellation flag shared between the Coordinator and every
/// worker it spawned for the current Active period.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation; observed by workers on their next check.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_cancelled() {
        let t = CancelToken::new();
        assert!(!t.is_cancelled());
    }

    #[test]
    fn cancel_is_observed_through_clones() {
        let t = CancelToken::new();
        let t2 = t.clone();
        t.cancel();
        assert!(t2.is_cancelled());
    }
}
