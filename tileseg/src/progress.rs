//! Progress reporting for pipeline passes.

use std::sync::Arc;

/// Progress information for one pass.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Tiles (or seams) finished so far in this pass.
    pub current: usize,
    /// Total number of tiles (or seams) in this pass.
    pub total: usize,
    pub stage: PassStage,
}

/// Pass currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStage {
    Segment,
    Resolve,
    Relabel,
    Prune,
    Polygonize,
    Fuse,
}

/// Callback type for progress reporting.
pub type ProgressCallback = Option<Arc<dyn Fn(Progress) + Send + Sync>>;

/// Report progress using the callback if set.
pub fn report_progress(
    callback: &ProgressCallback,
    current: usize,
    total: usize,
    stage: PassStage,
) {
    if let Some(f) = callback.as_ref() {
        f(Progress {
            current,
            total,
            stage,
        });
    }
}
