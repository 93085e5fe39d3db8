//! Streaming review API: one event per processed row.
//!
//! [`review_stream`] validates the run, then hands back a [`RowStream`] that
//! does no work until polled. Each poll reviews exactly one row and yields a
//! [`RowEvent`] with that row's result and the progress after it, so a
//! caller can render or persist results as they arrive.
//!
//! Rows are processed in input order, one at a time. Before starting any row
//! after the first, the stream checks the cancellation token and ends if it
//! has fired; the rows already yielded are final.

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::output::{ProgressState, RowResult};
use crate::pipeline::normalize::ReferenceNormalizer;
use crate::pipeline::score::RubricScorer;
use crate::progress::ProgressCallback;
use crate::review::{plan_run, resolve_normalizer, resolve_scorer, review_row, RunPlan};
use crate::table::{Row, Table};
use futures::stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One processed row and the run's progress after it.
#[derive(Debug, Clone)]
pub struct RowEvent {
    pub result: RowResult,
    pub progress: ProgressState,
}

/// A stream of [`RowEvent`]s for one run.
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = RowEvent> + Send>>,
    limit: usize,
}

impl RowStream {
    /// Number of rows the run will attempt if not cancelled.
    pub fn limit(&self) -> usize {
        self.limit
    }
}

impl Stream for RowStream {
    type Item = RowEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.limit))
    }
}

struct RunState {
    rows: std::vec::IntoIter<Row>,
    next: usize,
    plan: RunPlan,
    normalizer: Arc<dyn ReferenceNormalizer>,
    scorer: Arc<dyn RubricScorer>,
    callback: Option<ProgressCallback>,
    cancel: CancellationToken,
}

/// Validate a run over `table` and return a stream of its rows.
///
/// # Returns
/// - `Ok(RowStream)` — yields one event per attempted row
/// - `Err(ReviewError)` — a precondition failed; nothing was sent
///
/// # Example
/// ```rust,no_run
/// use futures::StreamExt;
/// use rubric_review::{read_csv_file, review_stream, CancellationToken, ReviewConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let table = read_csv_file("sheet.csv")?;
/// let config = ReviewConfig::builder().api_key("sk-…").build()?;
/// let mut rows = review_stream(table, &config, CancellationToken::new()).await?;
/// while let Some(event) = rows.next().await {
///     println!(
///         "{}/{} {:?}",
///         event.progress.done, event.progress.total, event.result.total_score
///     );
/// }
/// # Ok(())
/// # }
/// ```
pub async fn review_stream(
    table: Table,
    config: &ReviewConfig,
    cancel: CancellationToken,
) -> Result<RowStream, ReviewError> {
    let plan = plan_run(&table, config)?;
    let scorer = resolve_scorer(config)?;
    let normalizer = resolve_normalizer(config);
    let limit = plan.limit;

    let mut rows = table.rows;
    rows.truncate(limit);

    let state = RunState {
        rows: rows.into_iter(),
        next: 0,
        plan,
        normalizer,
        scorer,
        callback: config.progress_callback.clone(),
        cancel,
    };

    let inner = stream::unfold(state, move |mut st| async move {
        if st.next > 0 && st.cancel.is_cancelled() {
            info!("Review cancelled after {} of {} rows", st.next, limit);
            return None;
        }
        let row = st.rows.next()?;
        let index = st.next;

        if let Some(ref cb) = st.callback {
            cb.on_row_start(index + 1, limit);
        }

        let result = review_row(
            index,
            &row,
            &st.plan,
            st.normalizer.as_ref(),
            st.scorer.as_ref(),
            &st.cancel,
        )
        .await;

        st.next += 1;
        let progress = ProgressState {
            done: st.next,
            total: limit,
        };

        if let Some(ref cb) = st.callback {
            match &result.error {
                None => cb.on_row_complete(progress, result.total_score),
                Some(e) => cb.on_row_error(progress, &e.to_string()),
            }
        }

        Some((RowEvent { result, progress }, st))
    });

    Ok(RowStream {
        inner: Box::pin(inner),
        limit,
    })
}
