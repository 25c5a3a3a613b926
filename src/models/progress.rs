//! Batch progress snapshot
//!
//! One instance describes the most recent (or in-flight) search batch. The
//! shared mutable copy lives behind [`crate::state::ProgressTracker`]; this
//! struct is also what gets persisted and returned to status callers.

use serde::{Deserialize, Serialize};

/// Counters and flags for one search batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProgress {
    /// A batch is currently running
    pub active: bool,
    /// Items in the batch; fixed at batch start
    pub total: usize,
    /// Items finished (with or without results); monotonic while active
    pub completed: usize,
    /// Identity key of an item currently being worked on
    pub current_label: String,
    /// Human-readable per-item warnings, in completion order
    pub errors: Vec<String>,
    /// The batch ran to the end (all items, or cancelled cleanly)
    pub finished: bool,
    /// Cancellation was requested
    pub cancelled: bool,
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self {
            active: false,
            total: 0,
            completed: 0,
            current_label: String::new(),
            errors: Vec::new(),
            finished: false,
            cancelled: false,
        }
    }
}

impl BatchProgress {
    /// Fresh state for a starting batch of `total` items
    pub fn begin(total: usize) -> Self {
        Self {
            active: true,
            total,
            ..Self::default()
        }
    }
}
