//! Error types for the rubric-review library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ReviewError`] — **Fatal**: the run cannot start at all (no API key,
//!   empty spreadsheet, unknown image column, bad row limit) or its input and
//!   output files cannot be read or written. Returned as `Err(ReviewError)`
//!   from the top-level `review*` functions.
//!
//! * [`RowError`] — **Non-fatal**: a single row failed (blank image link,
//!   PDF render failure, scoring request failure) but every other row is
//!   still attempted. Stored inside [`crate::output::RowResult`] and rendered
//!   into the exported row's `error` column, which is the only audit trail
//!   once the spreadsheet leaves the tool.
//!
//! [`NormalizeError`] and [`ScoreError`] are the stage-level errors wrapped
//! by [`RowError`]. Their messages are prefixed differently so the four row
//! causes (missing reference, normalisation, request failure, service-side
//! non-success) can be told apart in the exported file.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the rubric-review library.
///
/// Row-level failures use [`RowError`] and are stored in
/// [`crate::output::RowResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Validation errors (checked in this order before any network call) ──
    /// No bearer credential was configured.
    #[error("Missing OpenAI API key.\nSet OPENAI_API_KEY or pass --api-key.")]
    MissingApiKey,

    /// The input table has no data rows.
    #[error("The input CSV has no data rows. Provide a CSV with a header line and at least one row.")]
    EmptyInput,

    /// The selected image column is not one of the input's columns.
    #[error("Select a valid image column (current: {column})\nAvailable columns: {available}")]
    InvalidImageColumn { column: String, available: String },

    /// The requested row limit resolves to zero rows.
    #[error("Please set a valid review count (got {requested}); it must be at least 1.")]
    InvalidLimit { requested: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The input CSV could not be opened or parsed.
    #[error("Failed to read CSV '{path}': {detail}")]
    CsvRead { path: PathBuf, detail: String },

    /// Could not create or write the exported CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReviewError {
    /// `true` for the pre-run checks that keep a run from starting.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReviewError::MissingApiKey
                | ReviewError::EmptyInput
                | ReviewError::InvalidImageColumn { .. }
                | ReviewError::InvalidLimit { .. }
        )
    }
}

/// A non-fatal error for a single row.
///
/// Its `Display` text is what lands in the exported `error` column.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum RowError {
    /// The image column was blank for this row. No work was attempted.
    #[error("Missing image URL")]
    MissingImageUrl,

    /// The reference pointed at a PDF that could not be turned into an image.
    #[error("Failed to render PDF to image: {0}")]
    Normalize(#[from] NormalizeError),

    /// The scoring call failed or was cancelled.
    #[error("{0}")]
    Scoring(#[from] ScoreError),
}

/// Failure while converting a document reference into an embeddable image.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum NormalizeError {
    /// Remote document could not be downloaded.
    #[error("download of '{url}' failed: {reason}")]
    FetchFailed { url: String, reason: String },

    /// Remote document download exceeded the configured timeout.
    #[error("download of '{url}' timed out after {secs}s")]
    DownloadTimeout { url: String, secs: u64 },

    /// Local document could not be read.
    #[error("could not read '{path}': {reason}")]
    ReadFailed { path: String, reason: String },

    /// The bytes do not start with the `%PDF` signature.
    #[error("'{reference}' is not a PDF (first bytes: {magic:?})")]
    NotAPdf { reference: String, magic: Vec<u8> },

    /// No pdfium library could be bound.
    #[error("pdfium library unavailable: {0} (set PDFIUM_LIB_PATH to the directory holding libpdfium)")]
    PdfiumUnavailable(String),

    /// pdfium could not open or rasterise the first page.
    #[error("rendering '{reference}' failed: {detail}")]
    RenderFailed { reference: String, detail: String },

    /// The rendered page could not be encoded as PNG.
    #[error("PNG encoding failed: {0}")]
    EncodeFailed(String),

    /// Unexpected internal error (e.g. the render task panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure of a single scoring request.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ScoreError {
    /// No API key; no request was made.
    #[error("Missing OpenAI API key")]
    MissingCredential,

    /// No image reference; no request was made.
    #[error("Missing image URL/data URL")]
    MissingImageReference,

    /// The service answered with a non-success status.
    #[error("OpenAI error {status}: {body}")]
    Api { status: u16, body: String },

    /// The response envelope had no message content.
    #[error("No content returned from OpenAI")]
    NoContent,

    /// The message content was not a rubric JSON object.
    #[error("Could not parse rubric JSON returned by OpenAI: {0}")]
    InvalidRubric(String),

    /// The request exceeded the configured timeout.
    #[error("Request to OpenAI timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The request never produced a response (connection, TLS, body read).
    #[error("Request to OpenAI failed: {0}")]
    Request(String),

    /// The run was cancelled while the request was outstanding.
    #[error("Scoring request cancelled")]
    Cancelled,
}
