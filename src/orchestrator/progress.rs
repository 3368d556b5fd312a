//! Progress reporting for a bounded sequence of steps.
//!
//! Renders `[#####---------] 33% (4/12) update_feeds` to its own stream
//! (stderr by default, separate from the logger's sinks). Each update
//! overwrites the previous one in place; the line is finalized with a
//! newline once `current == total`.

use std::io::{self, Write};

const BAR_WIDTH: usize = 30;

/// Transient position within a sequence. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
}

impl ProgressState {
    /// Clamps `current` to `total`.
    pub fn new(current: usize, total: usize) -> Self {
        ProgressState {
            current: current.min(total),
            total,
        }
    }

    /// Completed fraction in `[0, 1]`. An empty sequence is already complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f64 / self.total as f64
        }
    }

    /// Integer percentage, exactly 100 when `current == total`.
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        ((self.current * 100) / self.total) as u32
    }

    pub fn is_complete(&self) -> bool {
        self.current == self.total
    }

    /// The indicator text, without any cursor control.
    pub fn render(&self, label: &str) -> String {
        let filled = if self.total == 0 {
            BAR_WIDTH
        } else {
            self.current * BAR_WIDTH / self.total
        };
        format!(
            "[{}{}] {:>3}% ({}/{}) {}",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            self.percent(),
            self.current,
            self.total,
            label
        )
    }
}

/// Writes progress updates to a status stream.
pub struct ProgressReporter {
    out: Box<dyn Write>,
    last_width: usize,
}

impl ProgressReporter {
    pub fn stderr() -> Self {
        Self::new(Box::new(io::stderr()))
    }

    pub fn new(out: Box<dyn Write>) -> Self {
        ProgressReporter { out, last_width: 0 }
    }

    /// Render `current / total` for `label`, overwriting the previous update.
    pub fn report(&mut self, current: usize, total: usize, label: &str) -> ProgressState {
        let state = ProgressState::new(current, total);
        let line = state.render(label);
        let width = line.chars().count();
        let padding = self.last_width.saturating_sub(width);

        // Status output is best effort; it never affects the run.
        let _ = write!(self.out, "\r{}{}", line, " ".repeat(padding));
        if state.is_complete() {
            let _ = writeln!(self.out);
            self.last_width = 0;
        } else {
            self.last_width = width;
        }
        let _ = self.out.flush();
        state
    }
}
