//! Image encoding: `NormalizedImage` → PNG bytes for the recognition engine.
//!
//! PNG is lossless: JPEG ringing around binarised glyph edges is exactly the
//! kind of speckle the normaliser just removed. The encoded buffer is handed
//! to the engine over a pipe, never written to disk.

use crate::pipeline::preprocess::NormalizedImage;
use image::ImageFormat;
use std::io::Cursor;
use tracing::debug;

/// Encode a normalised image as an in-memory PNG.
pub fn encode_png(img: &NormalizedImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.pixels()
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;

    debug!(
        "Encoded {}x{} {} image → {} bytes PNG",
        img.width(),
        img.height(),
        img.profile(),
        buf.len()
    );
    Ok(buf)
}
