//! Format normalisation: make every reference directly embeddable.
//!
//! Vision models accept raster images, not PDFs. A reference whose
//! lowercased text ends in `.pdf` is fetched, its first page rendered and
//! returned as a PNG data URL; every other reference is passed through
//! untouched. Nothing is cached: the same PDF appearing on two rows is
//! rendered twice.

use crate::config::ReviewConfig;
use crate::error::NormalizeError;
use crate::pipeline::{encode, input, render};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Turns a raw reference from the sheet into something the scorer can embed.
#[async_trait]
pub trait ReferenceNormalizer: Send + Sync {
    async fn normalize(&self, reference: &str) -> Result<String, NormalizeError>;
}

/// `true` if `reference` names a multi-page document format.
pub fn is_document_reference(reference: &str) -> bool {
    reference.to_lowercase().ends_with(".pdf")
}

/// The built-in normaliser: pdfium first-page render for PDFs, pass-through otherwise.
#[derive(Debug, Clone)]
pub struct PdfNormalizer {
    scale: f32,
    download_timeout_secs: u64,
    pdfium_lib_path: Option<PathBuf>,
}

impl PdfNormalizer {
    pub fn new(scale: f32, download_timeout_secs: u64, pdfium_lib_path: Option<PathBuf>) -> Self {
        Self {
            scale,
            download_timeout_secs,
            pdfium_lib_path,
        }
    }

    pub fn from_config(config: &ReviewConfig) -> Self {
        Self::new(
            config.pdf_scale,
            config.download_timeout_secs,
            config.pdfium_lib_path.clone(),
        )
    }
}

impl Default for PdfNormalizer {
    fn default() -> Self {
        Self::from_config(&ReviewConfig::default())
    }
}

#[async_trait]
impl ReferenceNormalizer for PdfNormalizer {
    async fn normalize(&self, reference: &str) -> Result<String, NormalizeError> {
        if !is_document_reference(reference) {
            return Ok(reference.to_string());
        }

        debug!("Normalising PDF reference {}", reference);
        let bytes = input::fetch_document(reference, self.download_timeout_secs).await?;
        let image =
            render::render_first_page(reference, bytes, self.scale, self.pdfium_lib_path.clone())
                .await?;
        encode::encode_png_data_url(&image).map_err(|e| NormalizeError::EncodeFailed(e.to_string()))
    }
}
