//! Execution context consumed by long-running operations.
//!
//! The engine only ever calls [`Context::is_cancelled`] at coarse-grained
//! checkpoints (tile boundaries, once per output row) and
//! [`Context::report`] with a fraction in `[0, 1]`. Callers that do not care
//! pass [`NoContext`].

use std::sync::atomic::{AtomicBool, Ordering};

/// Carrier for cooperative cancellation and optional progress reporting.
///
/// Contexts are shared across tiles when tiling runs in parallel, hence the
/// `Sync` bound.
pub trait Context: Sync {
    /// Whether the caller asked for the computation to stop.
    ///
    /// A cancelled call returns [`Error::Interrupted`](crate::Error::Interrupted)
    /// and leaves the destination partially written; callers must discard it.
    fn is_cancelled(&self) -> bool {
        false
    }

    /// Coarse-grained progress report, `progress` in `[0, 1]`.
    fn report(&self, _progress: f64) {}
}

/// Context that never cancels and ignores progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl Context for NoContext {}

/// A simple thread-safe cancellation flag.
#[derive(Debug, Default)]
pub struct CancelFlag {
    cancelled: AtomicBool,
}

impl CancelFlag {
    /// Create a flag in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of the computation polling this flag.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

impl Context for CancelFlag {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
