//! Pure Rust codec backend built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff format | `image::guess_format` |
//! | Decode (JPEG, PNG, TIFF) | `image::load_from_memory` |
//! | Encode | `DynamicImage::write_to` into an in-memory cursor |
//!
//! JPEG has no alpha channel and no 16-bit mode, so images are flattened to
//! 8-bit gray or RGB before JPEG encoding. PNG and TIFF keep the layout as is.

use super::backend::{BackendError, ImageBackend};
use super::params::ImageExtension;
use image::{ColorType, DynamicImage};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Reduce an image to a layout the JPEG encoder accepts.
fn jpeg_compatible(img: &DynamicImage) -> DynamicImage {
    match img.color() {
        ColorType::L8 | ColorType::Rgb8 => img.clone(),
        ColorType::La8 | ColorType::L16 | ColorType::La16 => DynamicImage::ImageLuma8(img.to_luma8()),
        _ => DynamicImage::ImageRgb8(img.to_rgb8()),
    }
}

impl ImageBackend for RustBackend {
    fn detect_format(&self, bytes: &[u8]) -> Option<ImageExtension> {
        image::guess_format(bytes)
            .ok()
            .and_then(ImageExtension::from_format)
    }

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        if bytes.is_empty() {
            return Err(BackendError::Decode("empty payload".into()));
        }
        image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn encode(&self, image: &DynamicImage, ext: ImageExtension) -> Result<Vec<u8>, BackendError> {
        let mut buf = Cursor::new(Vec::new());
        let result = match ext {
            ImageExtension::Jpg => jpeg_compatible(image).write_to(&mut buf, ext.format()),
            ImageExtension::Png | ImageExtension::Tiff => image.write_to(&mut buf, ext.format()),
        };
        result.map_err(|e| BackendError::Encode(format!("{}: {}", ext.dotted(), e)))?;
        Ok(buf.into_inner())
    }
}
