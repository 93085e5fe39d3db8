//! Document fetching: turn a PDF reference into its bytes.
//!
//! A reference is either an HTTP/HTTPS URL or a local path. pdfium can open a
//! document from memory, so both cases end in a `Vec<u8>` and no temp file is
//! needed. The `%PDF` signature is checked before the bytes reach pdfium so an
//! HTML error page served with a `.pdf` URL reports as "not a PDF" rather than
//! as an opaque render failure.

use crate::error::NormalizeError;
use std::time::Duration;
use tracing::{debug, info};

/// Check if the reference looks like a URL.
pub fn is_url(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Load the document behind `reference` and verify it is a PDF.
pub async fn fetch_document(reference: &str, timeout_secs: u64) -> Result<Vec<u8>, NormalizeError> {
    let bytes = if is_url(reference) {
        download(reference, timeout_secs).await?
    } else {
        read_local(reference).await?
    };

    if !bytes.starts_with(b"%PDF") {
        return Err(NormalizeError::NotAPdf {
            reference: reference.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(bytes)
}

async fn read_local(path: &str) -> Result<Vec<u8>, NormalizeError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| NormalizeError::ReadFailed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    debug!("Read {} bytes from {}", bytes.len(), path);
    Ok(bytes)
}

async fn download(url: &str, timeout_secs: u64) -> Result<Vec<u8>, NormalizeError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| NormalizeError::FetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            NormalizeError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            NormalizeError::FetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(classify)?;

    if !response.status().is_success() {
        return Err(NormalizeError::FetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(classify)?;
    debug!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(bytes.to_vec())
}
