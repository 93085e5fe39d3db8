//! Eager (whole-sheet) review entry points.
//!
//! These wait for every selected row, then return a [`RunOutcome`]. They are
//! thin drivers over [`crate::stream::review_stream`], which does the actual
//! row-by-row work; use the stream directly to render results as they arrive.
//!
//! ## Run lifecycle
//!
//! ```text
//! plan_run ──▶ (row 1 ──▶ row 2 ──▶ … ──▶ row N) ──▶ Completed
//!    │                  │
//!    │                  └── token cancelled ──▶ Cancelled (rows so far kept)
//!    └── validation error: nothing runs, nothing is sent
//! ```

use crate::config::{ReviewConfig, RowLimit};
use crate::error::{ReviewError, RowError};
use crate::output::{ProgressState, RowResult, RunOutcome, RunStats, RunStatus};
use crate::pipeline::flatten::flatten;
use crate::pipeline::normalize::{PdfNormalizer, ReferenceNormalizer};
use crate::pipeline::score::{OpenAiScorer, RubricScorer};
use crate::stream::review_stream;
use crate::table::{export_csv, read_csv_file, Row, Table};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Column names and row count a validated run will use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPlan {
    pub image_column: String,
    pub brief_column: String,
    /// Rows to attempt, always `1..=table.rows.len()`.
    pub limit: usize,
}

/// Check the run preconditions in order and resolve the plan.
///
/// Credential, then non-empty input, then a valid image column, then a
/// positive row limit. The first failure wins.
pub fn plan_run(table: &Table, config: &ReviewConfig) -> Result<RunPlan, ReviewError> {
    if config.credential().is_none() {
        return Err(ReviewError::MissingApiKey);
    }
    if table.rows.is_empty() {
        return Err(ReviewError::EmptyInput);
    }

    let image_column = config.columns.image_column();
    if !table.has_field(image_column) {
        return Err(ReviewError::InvalidImageColumn {
            column: image_column.to_string(),
            available: table.fields.join(", "),
        });
    }

    let limit = config
        .limit
        .resolve(table.rows.len())
        .ok_or(ReviewError::InvalidLimit {
            requested: match config.limit {
                RowLimit::First(n) => n,
                RowLimit::All => 0,
            },
        })?;

    Ok(RunPlan {
        image_column: image_column.to_string(),
        brief_column: config.columns.brief_column().to_string(),
        limit,
    })
}

/// Review a single row. Never fails: every problem ends up in the result.
///
/// The output row is the input row followed by `Review` and the flattened
/// rubric columns, or by `error` when the row could not be scored.
pub async fn review_row(
    index: usize,
    row: &Row,
    plan: &RunPlan,
    normalizer: &dyn ReferenceNormalizer,
    scorer: &dyn RubricScorer,
    cancel: &CancellationToken,
) -> RowResult {
    let start = Instant::now();
    let reference = row.get(&plan.image_column).unwrap_or("").trim();
    let brief = row.get(&plan.brief_column).unwrap_or("").trim();

    let mut out = row.clone();

    if reference.is_empty() {
        warn!("Row {}: no image reference", index + 1);
        let err = RowError::MissingImageUrl;
        out.insert("error", err.to_string());
        return RowResult {
            index,
            row: out,
            total_score: None,
            error: Some(err),
            duration_ms: start.elapsed().as_millis() as u64,
        };
    }

    let scored = async {
        let image = normalizer.normalize(reference).await?;
        debug!("Row {}: scoring {}", index + 1, abbreviate(&image));
        Ok::<_, RowError>(scorer.score(&image, brief, cancel).await?)
    }
    .await;

    match scored {
        Ok(rubric) => {
            let flat = flatten(&rubric);
            out.insert("Review", flat.summary);
            out.extend(flat.fields);
            RowResult {
                index,
                row: out,
                total_score: flat.total,
                error: None,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
        Err(err) => {
            warn!("Row {} failed: {}", index + 1, err);
            out.insert("Review", "");
            out.insert("error", err.to_string());
            RowResult {
                index,
                row: out,
                total_score: None,
                error: Some(err),
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
    }
}

/// Review the rows of an already-parsed table.
///
/// Returns `Err` only for validation failures; row failures are reported in
/// the outcome. Cancelling `cancel` stops the run after the row in flight.
pub async fn review_table(
    table: Table,
    config: &ReviewConfig,
    cancel: CancellationToken,
) -> Result<RunOutcome, ReviewError> {
    let run_start = Instant::now();
    let input_rows = table.rows.len();

    let mut stream = review_stream(table, config, cancel).await?;
    let limit = stream.limit();
    info!("Starting review of {} of {} rows", limit, input_rows);

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(limit);
    }

    let mut rows = Vec::with_capacity(limit);
    let mut progress = ProgressState {
        done: 0,
        total: limit,
    };
    while let Some(event) = stream.next().await {
        progress = event.progress;
        rows.push(event.result);
    }

    let status = if progress.done < limit {
        RunStatus::Cancelled
    } else {
        RunStatus::Completed
    };

    let succeeded_rows = rows.iter().filter(|r| r.is_success()).count();
    let stats = RunStats {
        input_rows,
        selected_rows: limit,
        succeeded_rows,
        failed_rows: rows.len() - succeeded_rows,
        total_duration_ms: run_start.elapsed().as_millis() as u64,
    };

    info!(
        "Review {:?}: {}/{} rows, {} failed, {}ms",
        status, progress.done, limit, stats.failed_rows, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(progress, status);
    }

    Ok(RunOutcome {
        rows,
        progress,
        status,
        stats,
    })
}

/// Read a CSV file and review it.
pub async fn review_file(
    input: impl AsRef<Path>,
    config: &ReviewConfig,
    cancel: CancellationToken,
) -> Result<RunOutcome, ReviewError> {
    let table = read_csv_file(input)?;
    review_table(table, config, cancel).await
}

/// Review a CSV file and export the results to `output`.
///
/// The export is skipped when the run produced no rows. Results from a
/// cancelled run are still written.
pub async fn review_to_file(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    config: &ReviewConfig,
    cancel: CancellationToken,
) -> Result<RunOutcome, ReviewError> {
    let outcome = review_file(input, config, cancel).await?;
    let rows = outcome.output_rows();
    let output = output.as_ref().to_path_buf();

    tokio::task::spawn_blocking(move || export_csv(&output, &rows))
        .await
        .map_err(|e| ReviewError::Internal(format!("Export task panicked: {}", e)))??;

    Ok(outcome)
}

/// Synchronous wrapper around [`review_file`].
///
/// Creates a temporary tokio runtime internally. The run cannot be cancelled.
pub fn review_sync(
    input: impl AsRef<Path>,
    config: &ReviewConfig,
) -> Result<RunOutcome, ReviewError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ReviewError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(review_file(input, config, CancellationToken::new()))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Use the injected scorer, or build the HTTP one from the config.
pub(crate) fn resolve_scorer(config: &ReviewConfig) -> Result<Arc<dyn RubricScorer>, ReviewError> {
    if let Some(ref scorer) = config.scorer {
        return Ok(Arc::clone(scorer));
    }
    let scorer = OpenAiScorer::from_config(config)
        .map_err(|e| ReviewError::InvalidConfig(format!("HTTP client: {e}")))?;
    Ok(Arc::new(scorer))
}

/// Use the injected normaliser, or the pdfium-backed default.
pub(crate) fn resolve_normalizer(config: &ReviewConfig) -> Arc<dyn ReferenceNormalizer> {
    match config.normalizer {
        Some(ref n) => Arc::clone(n),
        None => Arc::new(PdfNormalizer::from_config(config)),
    }
}

/// Keep data URLs out of debug logs.
fn abbreviate(reference: &str) -> &str {
    if reference.starts_with("data:") {
        reference.split(',').next().unwrap_or("data:")
    } else {
        reference
    }
}
