//! Run state tracking.
//!
//! `StepTracker` holds the last-known pipeline step so the fatal error trap
//! (including its panic hook) can name the step that was running when a run
//! died. `RunSummary` is the Driver's result for a completed run.

use std::sync::{Arc, Mutex};

/// Shared handle to the name of the step currently being dispatched.
#[derive(Debug, Clone, Default)]
pub struct StepTracker {
    current: Arc<Mutex<Option<String>>>,
}

impl StepTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `step` is about to run.
    pub fn enter(&self, step: &str) {
        let mut slot = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(step.to_string());
    }

    /// The last step recorded, if any.
    pub fn last_step(&self) -> Option<String> {
        match self.current.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Outcome of a pipeline run that visited every declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Steps whose handler ran and succeeded, in order.
    pub executed: Vec<String>,
    /// Steps resolved to Skip, in order.
    pub skipped: Vec<String>,
    /// Dispatched steps with no registered handler, in order.
    pub missing: Vec<String>,
}

impl RunSummary {
    /// Total number of declarations visited.
    pub fn visited(&self) -> usize {
        self.executed.len() + self.skipped.len() + self.missing.len()
    }
}
