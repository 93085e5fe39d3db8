//! Progress-callback trait for per-row review events.
//!
//! Inject an [`Arc<dyn ReviewProgressCallback>`] via
//! [`crate::config::ReviewConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the sheet.
//!
//! The pipeline only ever calls these hooks; it never reads anything back.
//! A progress bar, a log line, or a channel to a UI can sit behind the trait
//! without the pipeline knowing which.
//!
//! # Example
//!
//! ```rust
//! use rubric_review::{ReviewConfig, ReviewProgressCallback, ProgressState};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counting {
//!     done: AtomicUsize,
//! }
//!
//! impl ReviewProgressCallback for Counting {
//!     fn on_row_complete(&self, progress: ProgressState, total_score: Option<u32>) {
//!         self.done.store(progress.done, Ordering::SeqCst);
//!         eprintln!("{}/{} scored {:?}", progress.done, progress.total, total_score);
//!     }
//! }
//!
//! let config = ReviewConfig::builder()
//!     .progress_callback(Arc::new(Counting { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::{ProgressState, RunStatus};
use std::sync::Arc;

/// Called by the review pipeline as it processes each row.
///
/// Rows are processed strictly one after another, so hooks are never called
/// concurrently for the same run. The trait is still `Send + Sync` because
/// the run itself may be driven from any tokio worker thread.
pub trait ReviewProgressCallback: Send + Sync {
    /// Called once, after validation, before the first row.
    ///
    /// # Arguments
    /// * `total_rows` — number of rows this run will attempt
    fn on_run_start(&self, total_rows: usize) {
        let _ = total_rows;
    }

    /// Called just before a row's reference is normalised and scored.
    ///
    /// # Arguments
    /// * `row_num`    — 1-indexed row number
    /// * `total_rows` — rows in this run
    fn on_row_start(&self, row_num: usize, total_rows: usize) {
        let _ = (row_num, total_rows);
    }

    /// Called when a row was scored.
    ///
    /// # Arguments
    /// * `progress`    — progress after this row
    /// * `total_score` — sum of the row's present category scores, if any
    fn on_row_complete(&self, progress: ProgressState, total_score: Option<u32>) {
        let _ = (progress, total_score);
    }

    /// Called when a row failed. The run continues with the next row.
    ///
    /// # Arguments
    /// * `progress` — progress after this row
    /// * `error`    — the message written to the row's `error` column
    fn on_row_error(&self, progress: ProgressState, error: &str) {
        let _ = (progress, error);
    }

    /// Called once when the run finished or stopped after a cancellation.
    fn on_run_complete(&self, progress: ProgressState, status: RunStatus) {
        let _ = (progress, status);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ReviewProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ReviewConfig`].
pub type ProgressCallback = Arc<dyn ReviewProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        last_done: AtomicUsize,
    }

    impl ReviewProgressCallback for TrackingCallback {
        fn on_row_start(&self, _row_num: usize, _total_rows: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_row_complete(&self, progress: ProgressState, _total_score: Option<u32>) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.last_done.store(progress.done, Ordering::SeqCst);
        }

        fn on_row_error(&self, progress: ProgressState, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
            self.last_done.store(progress.done, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_row_start(1, 3);
        cb.on_row_complete(ProgressState { done: 1, total: 3 }, Some(63));
        cb.on_row_error(ProgressState { done: 2, total: 3 }, "Missing image URL");
        cb.on_run_complete(ProgressState { done: 2, total: 3 }, RunStatus::Cancelled);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            last_done: AtomicUsize::new(0),
        };
        tracker.on_row_start(1, 2);
        tracker.on_row_complete(ProgressState { done: 1, total: 2 }, None);
        tracker.on_row_start(2, 2);
        tracker.on_row_error(ProgressState { done: 2, total: 2 }, "OpenAI error 500: ");

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.last_done.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10);
        cb.on_row_start(1, 10);
    }
}
