//! Progress reporting for long-running jobs.
//!
//! Reporting is advisory: sinks return nothing and must never block or fail
//! the job they observe.

use tracing::{error, info};

/// Fixed checkpoints of the single-paper pipeline
pub mod milestone {
    pub const RETRIEVING: u8 = 0;
    pub const PARSING: u8 = 20;
    pub const SUMMARIZING: u8 = 40;
    /// All map requests done, reduce starting
    pub const REDUCING: u8 = 60;
    pub const FORMATTING: u8 = 80;
    pub const DONE: u8 = 100;
}

pub trait ProgressSink: Send + Sync {
    /// `percent` is one of the `milestone` checkpoints, never above 100.
    fn report(&self, percent: u8, text: &str);

    /// Mark the job failed
    fn fail(&self, text: &str);
}

/// Writes progress to the tracing log, prefixed with a job label
#[derive(Debug, Clone)]
pub struct LogProgress {
    label: String,
}

impl LogProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: shorten(&label.into(), 50),
        }
    }
}

impl ProgressSink for LogProgress {
    fn report(&self, percent: u8, text: &str) {
        info!(job = %self.label, percent = percent.min(100), "{}", text);
    }

    fn fail(&self, text: &str) {
        error!(job = %self.label, "{}", text);
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _text: &str) {}

    fn fail(&self, _text: &str) {}
}

/// Cut `s` to `max_chars` characters, appending "..." when shortened.
pub(crate) fn shorten(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}
