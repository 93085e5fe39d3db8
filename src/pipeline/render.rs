//! PDF rasterisation: render the first page of a document via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which is
//! CPU-bound and not async-aware. `tokio::task::spawn_blocking` moves the
//! work onto the blocking pool so the runtime's worker threads keep serving
//! the progress UI and the cancellation signal while a page renders.
//!
//! ## Binding
//!
//! pdfium is bound per render, from `pdfium_lib_path` when configured and
//! from the system library search path otherwise. Rows are processed one at
//! a time, so there is never more than one live binding.

use crate::error::NormalizeError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Rasterise page one of the PDF in `bytes` at `scale` × its natural size.
///
/// `reference` is only used to make error messages point at the right row.
pub async fn render_first_page(
    reference: &str,
    bytes: Vec<u8>,
    scale: f32,
    pdfium_lib_path: Option<PathBuf>,
) -> Result<DynamicImage, NormalizeError> {
    let reference_owned = reference.to_string();

    tokio::task::spawn_blocking(move || {
        render_first_page_blocking(&reference_owned, bytes, scale, pdfium_lib_path.as_deref())
    })
    .await
    .map_err(|e| NormalizeError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of first-page rendering.
fn render_first_page_blocking(
    reference: &str,
    bytes: Vec<u8>,
    scale: f32,
    pdfium_lib_path: Option<&Path>,
) -> Result<DynamicImage, NormalizeError> {
    let pdfium = bind_pdfium(pdfium_lib_path)?;

    let render_err = |detail: String| NormalizeError::RenderFailed {
        reference: reference.to_string(),
        detail,
    };

    let document = pdfium
        .load_pdf_from_byte_vec(bytes, None)
        .map_err(|e| render_err(format!("{:?}", e)))?;

    let pages = document.pages();
    debug!("PDF loaded: {} pages", pages.len());

    let page = pages
        .first()
        .map_err(|e| render_err(format!("document has no first page: {:?}", e)))?;

    let render_config = PdfRenderConfig::new().scale_page_by_factor(scale);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| render_err(format!("{:?}", e)))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page 1 of {} → {}x{} px",
        reference,
        image.width(),
        image.height()
    );
    Ok(image)
}

fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, NormalizeError> {
    let bindings = match lib_path {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| NormalizeError::PdfiumUnavailable(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}
