//! Shared test utilities for the imgvault test suite.
//!
//! Fixtures are generated in memory with the `image` crate, so no binary
//! files live in the repository.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let payload = png_payload(8, 6);
//! let item = upload_item("cat.png", &payload, "01100");
//! let store = store_with_user("alice");
//! ```

use crate::imaging::payload::{from_base64, to_base64};
use crate::imaging::{ImageBackend, ImageExtension, RustBackend};
use crate::signature::Signature;
use crate::store::VersionStore;
use image::{DynamicImage, Rgb, RgbImage};
use serde_json::{Value, json};

// =========================================================================
// Images
// =========================================================================

/// A deterministic RGB gradient. `seed` shifts the pattern so two fixtures
/// with the same size still differ.
pub fn gradient(width: u32, height: u32, seed: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 17 + y * 3) as u8 ^ seed,
            (y * 29 + 7) as u8,
            (x * y * 5) as u8 ^ seed.rotate_left(3),
        ])
    }))
}

/// Encode an image with [`RustBackend`]. Panics on failure.
pub fn encode(img: &DynamicImage, ext: ImageExtension) -> Vec<u8> {
    RustBackend::new().encode(img, ext).unwrap()
}

/// Base64 PNG of [`gradient`] with seed 0.
pub fn png_payload(width: u32, height: u32) -> String {
    to_base64(&encode(&gradient(width, height, 0), ImageExtension::Png))
}

/// Base64 PNG of [`gradient`] with the given seed.
pub fn png_payload_seeded(width: u32, height: u32, seed: u8) -> String {
    to_base64(&encode(&gradient(width, height, seed), ImageExtension::Png))
}

/// Base64 JPEG of [`gradient`] with seed 0.
pub fn jpeg_payload(width: u32, height: u32) -> String {
    to_base64(&encode(&gradient(width, height, 0), ImageExtension::Jpg))
}

/// Decode a base64 image payload. Panics on failure.
pub fn decode_payload(payload: &str) -> DynamicImage {
    RustBackend::new()
        .decode(&from_base64(payload).unwrap())
        .unwrap()
}

// =========================================================================
// Batch items
// =========================================================================

/// Flags of a signature as a JSON boolean list.
pub fn flags_json(signature: &str) -> Value {
    let sig: Signature = signature.parse().unwrap();
    json!(sig.selection().flags())
}

/// `[filename, payload, flags]` upload item.
pub fn upload_item(filename: &str, payload: &str, signature: &str) -> Value {
    json!([filename, payload, flags_json(signature)])
}

/// `[filename, extension, flags]` download item.
pub fn download_item(filename: &str, extension: &str, signature: &str) -> Value {
    json!([filename, extension, flags_json(signature)])
}

// =========================================================================
// Store
// =========================================================================

/// In-memory store with one registered user.
pub fn store_with_user(username: &str) -> VersionStore {
    let mut store = VersionStore::in_memory();
    store.create_user(username).unwrap();
    store
}
