//! Configuration types for a review run.
//!
//! Everything a run needs is carried by [`ReviewConfig`], built via its
//! [`ReviewConfigBuilder`]. Nothing is read from global state during a run:
//! the CLI maps flags and environment variables into this struct, and library
//! callers construct it directly.

use crate::error::ReviewError;
use crate::pipeline::normalize::ReferenceNormalizer;
use crate::pipeline::score::RubricScorer;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Column used for image links when the mapping leaves it unset.
pub const DEFAULT_IMAGE_COLUMN: &str = "image_url";
/// Column used for the brief when the mapping leaves it unset.
pub const DEFAULT_BRIEF_COLUMN: &str = "brief";
/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
/// Default vision model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for one review run.
///
/// # Example
/// ```rust
/// use rubric_review::{ColumnMapping, ReviewConfig, RowLimit};
///
/// let config = ReviewConfig::builder()
///     .api_key("sk-...")
///     .limit(RowLimit::First(10))
///     .columns(ColumnMapping::new("poster_link").with_brief("objective"))
///     .build()
///     .unwrap();
/// assert_eq!(config.columns.image_column(), "poster_link");
/// ```
#[derive(Clone)]
pub struct ReviewConfig {
    /// Bearer credential for the scoring service. Required to start a run.
    pub api_key: Option<String>,

    /// Model identifier sent with every request. Default: `gpt-4o-mini`.
    pub model: String,

    /// Chat-completion endpoint. Any OpenAI-compatible URL works.
    pub endpoint: String,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Scores should be repeatable across runs of the same sheet, so sampling
    /// stays close to deterministic.
    pub temperature: f32,

    /// How many rows to review. Default: all.
    pub limit: RowLimit,

    /// Which columns hold the image link and the brief.
    pub columns: ColumnMapping,

    /// Magnification used when rasterising the first page of a PDF. Default: 1.5.
    pub pdf_scale: f32,

    /// Directory holding the pdfium shared library.
    /// If None, the system library search path is used.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Timeout for downloading remote PDF references, in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional timeout for a single scoring request, in seconds.
    /// None (the default) leaves the request unbounded; cancellation still applies.
    pub api_timeout_secs: Option<u64>,

    /// Receives per-row progress events.
    pub progress_callback: Option<ProgressCallback>,

    /// Pre-constructed scorer. Takes precedence over the built-in HTTP client.
    pub scorer: Option<Arc<dyn RubricScorer>>,

    /// Pre-constructed normaliser. Takes precedence over the built-in PDF renderer.
    pub normalizer: Option<Arc<dyn ReferenceNormalizer>>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            temperature: 0.2,
            limit: RowLimit::default(),
            columns: ColumnMapping::default(),
            pdf_scale: 1.5,
            pdfium_lib_path: None,
            download_timeout_secs: 120,
            api_timeout_secs: None,
            progress_callback: None,
            scorer: None,
            normalizer: None,
        }
    }
}

impl fmt::Debug for ReviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("limit", &self.limit)
            .field("columns", &self.columns)
            .field("pdf_scale", &self.pdf_scale)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ReviewProgressCallback>"),
            )
            .field(
                "scorer",
                &self.scorer.as_ref().map(|_| "<dyn RubricScorer>"),
            )
            .field(
                "normalizer",
                &self.normalizer.as_ref().map(|_| "<dyn ReferenceNormalizer>"),
            )
            .finish()
    }
}

impl ReviewConfig {
    /// Create a new builder for `ReviewConfig`.
    pub fn builder() -> ReviewConfigBuilder {
        ReviewConfigBuilder {
            config: Self::default(),
        }
    }

    /// The API key with surrounding whitespace removed, if non-empty.
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Builder for [`ReviewConfig`].
#[derive(Debug)]
pub struct ReviewConfigBuilder {
    config: ReviewConfig,
}

impl ReviewConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn limit(mut self, limit: RowLimit) -> Self {
        self.config.limit = limit;
        self
    }

    pub fn columns(mut self, columns: ColumnMapping) -> Self {
        self.config.columns = columns;
        self
    }

    pub fn pdf_scale(mut self, scale: f32) -> Self {
        self.config.pdf_scale = scale.clamp(0.25, 8.0);
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = Some(secs);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn scorer(mut self, scorer: Arc<dyn RubricScorer>) -> Self {
        self.config.scorer = Some(scorer);
        self
    }

    pub fn normalizer(mut self, normalizer: Arc<dyn ReferenceNormalizer>) -> Self {
        self.config.normalizer = Some(normalizer);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// Run preconditions that depend on the input (credential, columns,
    /// row limit) are checked when the run starts, not here.
    pub fn build(self) -> Result<ReviewConfig, ReviewError> {
        let c = &self.config;
        if !c.temperature.is_finite() {
            return Err(ReviewError::InvalidConfig(format!(
                "temperature must be a finite number, got {}",
                c.temperature
            )));
        }
        if !c.pdf_scale.is_finite() {
            return Err(ReviewError::InvalidConfig(format!(
                "PDF scale must be a finite number, got {}",
                c.pdf_scale
            )));
        }
        if c.endpoint.trim().is_empty() {
            return Err(ReviewError::InvalidConfig("endpoint must not be empty".into()));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// How many input rows a run reviews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RowLimit {
    /// Every row (default).
    #[default]
    All,
    /// The first `n` rows, clamped to the row count.
    First(usize),
}

impl RowLimit {
    /// Number of rows a run over `row_count` rows will attempt.
    ///
    /// Returns `None` when that number would be zero.
    pub fn resolve(&self, row_count: usize) -> Option<usize> {
        let n = match self {
            RowLimit::All => row_count,
            RowLimit::First(n) => (*n).min(row_count),
        };
        (n > 0).then_some(n)
    }
}

/// Which columns hold the image reference and the optional brief.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub image: Option<String>,
    pub brief: Option<String>,
}

impl ColumnMapping {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            brief: None,
        }
    }

    pub fn with_brief(mut self, brief: impl Into<String>) -> Self {
        self.brief = Some(brief.into());
        self
    }

    /// Image column name, falling back to `image_url` when unset or blank.
    pub fn image_column(&self) -> &str {
        non_blank(self.image.as_deref()).unwrap_or(DEFAULT_IMAGE_COLUMN)
    }

    /// Brief column name, falling back to `brief` when unset or blank.
    pub fn brief_column(&self) -> &str {
        non_blank(self.brief.as_deref()).unwrap_or(DEFAULT_BRIEF_COLUMN)
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ReviewConfig::default();
        assert_eq!(c.model, "gpt-4o-mini");
        assert_eq!(c.temperature, 0.2);
        assert_eq!(c.pdf_scale, 1.5);
        assert_eq!(c.limit, RowLimit::All);
        assert_eq!(c.api_timeout_secs, None);
    }

    #[test]
    fn row_limit_resolution() {
        assert_eq!(RowLimit::All.resolve(5), Some(5));
        assert_eq!(RowLimit::All.resolve(0), None);
        assert_eq!(RowLimit::First(3).resolve(5), Some(3));
        assert_eq!(RowLimit::First(50).resolve(5), Some(5));
        assert_eq!(RowLimit::First(0).resolve(5), None);
    }

    #[test]
    fn column_defaults_apply_when_unset_or_blank() {
        let m = ColumnMapping::default();
        assert_eq!(m.image_column(), "image_url");
        assert_eq!(m.brief_column(), "brief");

        let m = ColumnMapping {
            image: Some("  ".into()),
            brief: Some("objective".into()),
        };
        assert_eq!(m.image_column(), "image_url");
        assert_eq!(m.brief_column(), "objective");
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = ReviewConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"), "got: {dbg}");
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn credential_ignores_blank_keys() {
        let c = ReviewConfig::builder().api_key("   ").build().unwrap();
        assert_eq!(c.credential(), None);
        let c = ReviewConfig::builder().api_key(" sk-1 ").build().unwrap();
        assert_eq!(c.credential(), Some("sk-1"));
    }

    #[test]
    fn builder_clamps_and_validates() {
        let c = ReviewConfig::builder().temperature(9.0).pdf_scale(0.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.pdf_scale, 0.25);
        assert!(ReviewConfig::builder().endpoint(" ").build().is_err());
    }
}
