//! Result types produced by a review run.

use crate::error::RowError;
use crate::table::Row;
use serde::Serialize;

/// How far a run has got. `done` never decreases within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressState {
    pub done: usize,
    pub total: usize,
}

impl ProgressState {
    /// Completion percentage, rounded to the nearest integer.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.done as f64 / self.total as f64) * 100.0).round() as u8
    }
}

/// The outcome of one processed row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowResult {
    /// 0-indexed position of the row in the input.
    pub index: usize,

    /// The exported row: original columns plus `Review`, the per-category
    /// columns and totals, or `error` on failure.
    pub row: Row,

    /// Sum of present category scores, when the row was scored and had any.
    pub total_score: Option<u32>,

    /// Set when the row failed. Its message is also in `row["error"]`.
    pub error: Option<RowError>,

    /// Wall-clock time spent on this row.
    pub duration_ms: u64,
}

impl RowResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every row up to the limit was attempted.
    Completed,
    /// Cancellation stopped the run before the limit was reached.
    Cancelled,
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Rows in the input file.
    pub input_rows: usize,
    /// Rows the limit selected.
    pub selected_rows: usize,
    /// Rows scored without error.
    pub succeeded_rows: usize,
    /// Rows that carry an `error`.
    pub failed_rows: usize,
    /// Wall-clock duration of the run.
    pub total_duration_ms: u64,
}

/// Everything a finished (or cancelled) run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub rows: Vec<RowResult>,
    pub progress: ProgressState,
    pub status: RunStatus,
    pub stats: RunStats,
}

impl RunOutcome {
    /// The exported rows, in input order.
    pub fn output_rows(&self) -> Vec<Row> {
        self.rows.iter().map(|r| r.row.clone()).collect()
    }

    pub fn was_cancelled(&self) -> bool {
        self.status == RunStatus::Cancelled
    }
}
