//! Image encoding: `DynamicImage` → PNG bytes → base64 data URI.
//!
//! Vision APIs accept images as base64 data URIs embedded in the JSON request
//! body. PNG is lossless, which keeps the small print of a title block (author
//! lists, affiliations) crisp enough for the model to read.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// MIME type of every [`PageImage`].
pub const PNG_MIME: &str = "image/png";

/// A rendered page, PNG-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    png: Vec<u8>,
}

impl PageImage {
    /// Wrap bytes that are already PNG-encoded.
    pub fn from_png(png: Vec<u8>) -> Self {
        Self { png }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.png)
    }

    /// `data:image/png;base64,...`
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", PNG_MIME, self.to_base64())
    }
}

/// Encode a rasterised page as PNG.
pub fn encode_page(img: &DynamicImage) -> Result<PageImage, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} page → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(PageImage::from_png(buf))
}
