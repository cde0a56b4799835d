//! Per-run counters for the batch stages

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

/// Outcome of one item in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Written,
    Skipped,
    Failed,
}

/// Counters for one stage run.
pub struct BatchStats {
    stage: &'static str,
    timer: Timer,
    written: u64,
    skipped: u64,
    failed: u64,
}

impl BatchStats {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            timer: Timer::new(),
            written: 0,
            skipped: 0,
            failed: 0,
        }
    }

    pub fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Written => self.written += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }

    /// Log and return the final summary.
    pub fn finish(self) -> BatchSummary {
        let summary = BatchSummary {
            stage: self.stage.to_string(),
            written: self.written,
            skipped: self.skipped,
            failed: self.failed,
            elapsed_ms: self.timer.elapsed_ms(),
        };
        info!(
            "{} finished: {} written, {} skipped, {} failed in {}ms",
            summary.stage, summary.written, summary.skipped, summary.failed, summary.elapsed_ms
        );
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub stage: String,
    pub written: u64,
    pub skipped: u64,
    pub failed: u64,
    pub elapsed_ms: u64,
}

impl BatchSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Timer for tracking stage latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}
