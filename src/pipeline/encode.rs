//! Image encoding: `DynamicImage` → `data:image/png;base64,…` URL.
//!
//! The scoring request carries the image as an `image_url` part, which accepts
//! either a fetchable URL or an inline data URL. A rendered PDF page has no
//! URL of its own, so it travels inline. PNG keeps small type crisp, which
//! matters for the typography and accessibility categories.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rendered page as a PNG data URL.
pub fn encode_png_data_url(img: &DynamicImage) -> Result<String, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!(
        "Encoded {}x{} image → {} bytes base64",
        img.width(),
        img.height(),
        b64.len()
    );

    Ok(format!("data:image/png;base64,{b64}"))
}
