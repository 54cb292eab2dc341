//! Progress reporting for the permutation trials.
//!
//! [`ProgressCallback`] keeps the engine free of any rendering backend.
//! The CLI supplies an `indicatif` bar; tests and library callers use
//! [`null_progress`].

use std::sync::Arc;

/// Receives progress from the permutation trials.
///
/// Trials run on a thread pool, so implementations are shared across
/// threads and `inc` may be called concurrently.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of trials.
    fn set_total(&self, total: u64);

    /// Advances by `delta` trials.
    fn inc(&self, delta: u64);

    /// Marks the trials complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

/// A shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
