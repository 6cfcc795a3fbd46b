//! Image codec backend trait and shared types.
//!
//! The [`ImageBackend`] trait covers the three codec operations the rest of
//! the crate needs: sniff the format of an encoded payload, decode it into a
//! pixel buffer, and encode a pixel buffer into one of the download formats.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Transforms never go through the backend; they operate on the
//! decoded [`DynamicImage`] directly.

use super::params::ImageExtension;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Payload is not a decodable image: {0}")]
    Decode(String),
    #[error("Encoding failed: {0}")]
    Encode(String),
}

/// Width and height of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl From<&DynamicImage> for Dimensions {
    fn from(img: &DynamicImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
        }
    }
}

/// Trait for image codec backends.
pub trait ImageBackend {
    /// Guess the encoding of `bytes` from its magic number.
    fn detect_format(&self, bytes: &[u8]) -> Option<ImageExtension>;

    /// Decode encoded image bytes into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError>;

    /// Encode pixels into the given format.
    fn encode(&self, image: &DynamicImage, ext: ImageExtension) -> Result<Vec<u8>, BackendError>;
}
