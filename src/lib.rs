//! # rubric-review
//!
//! Score a spreadsheet of graphic-design images against a fixed 9-category
//! rubric using a vision-capable chat model, and export the scores as CSV.
//!
//! ## Pipeline Overview
//!
//! ```text
//! CSV
//!  │
//!  ├─ 1. Table      parse rows; validate credential, column and row limit
//!  ├─ 2. Normalize  PDFs → first page at 1.5× as a PNG data URL (pdfium)
//!  ├─ 3. Score      one chat-completion call per row, JSON rubric back
//!  ├─ 4. Flatten    per-category Score/Notes, Total, Average, Review
//!  └─ 5. Export     CSV with accumulated headers
//! ```
//!
//! Rows are reviewed one at a time, in order. A failing row gets an `error`
//! column and the run moves on; cancelling the run keeps every row reviewed
//! so far.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rubric_review::{review_to_file, CancellationToken, ReviewConfig, RowLimit};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ReviewConfig::builder()
//!         .api_key(std::env::var("OPENAI_API_KEY")?)
//!         .limit(RowLimit::First(10))
//!         .build()?;
//!     let outcome = review_to_file(
//!         "submissions.csv",
//!         "graphics-review-results.csv",
//!         &config,
//!         CancellationToken::new(),
//!     )
//!     .await?;
//!     eprintln!(
//!         "{}/{} rows, {} failed",
//!         outcome.progress.done, outcome.progress.total, outcome.stats.failed_rows
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `rubric-review` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! rubric-review = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod review;
pub mod rubric;
pub mod stream;
pub mod table;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ColumnMapping, ReviewConfig, ReviewConfigBuilder, RowLimit};
pub use error::{NormalizeError, ReviewError, RowError, ScoreError};
pub use output::{ProgressState, RowResult, RunOutcome, RunStats, RunStatus};
pub use pipeline::flatten::{flatten, format_average, Flattened};
pub use pipeline::normalize::{is_document_reference, PdfNormalizer, ReferenceNormalizer};
pub use pipeline::score::{OpenAiScorer, RubricScorer};
pub use progress::{NoopProgressCallback, ProgressCallback, ReviewProgressCallback};
pub use review::{
    plan_run, review_file, review_row, review_sync, review_table, review_to_file, RunPlan,
};
pub use rubric::{Category, CategoryScore, RubricResult};
pub use stream::{review_stream, RowEvent, RowStream};
pub use table::{
    export_csv, parse_csv, read_csv_file, to_csv_string, Row, Table, DEFAULT_EXPORT_FILE,
};
pub use tokio_util::sync::CancellationToken;
