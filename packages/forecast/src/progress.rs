//! Progress hooks for a forecast run.
//!
//! The pipeline reports in targets: the grid size once up front, one tick
//! per evaluated target, then a closing line. Rendering is left to the
//! caller; the CLI draws an `indicatif` bar.

use std::sync::Arc;

/// Observer of a forecast run.
///
/// Ticks arrive from rayon workers when the grid is evaluated in parallel,
/// hence `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Called once before evaluation with the number of targets in the grid.
    fn start(&self, targets: u64, message: &str);

    /// Called after each target is evaluated, in no particular order.
    fn target_done(&self);

    /// Called once when the run completes or aborts.
    fn finish(&self, summary: &str);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn start(&self, _targets: u64, _message: &str) {}
    fn target_done(&self) {}
    fn finish(&self, _summary: &str) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
