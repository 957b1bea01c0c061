//! Per-sweep outcome counters.
//!
//! `skipped` covers expected non-sends: channel not linked, feature disabled
//! for the target, or a conditional update lost to a concurrent sweep that
//! already handled the row. Only transport/store problems count as `failed`.

use serde::Serialize;

/// Outcome of processing a single reminder item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ItemOutcome {
    Succeeded,
    Skipped,
    Failed,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepStats {
    pub processed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl SweepStats {
    pub(crate) fn record(&mut self, outcome: ItemOutcome) {
        self.processed += 1;
        match outcome {
            ItemOutcome::Succeeded => self.succeeded += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Failed => self.failed += 1,
        }
    }
}

/// Aggregate result of one sweep invocation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SweepReport {
    pub goal_reminders: SweepStats,
    pub habit_reminders: SweepStats,
}
