//! Image processing: pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Base64 payloads** | `base64` standard engine |
//! | **Decode / encode** | `image` crate (JPEG, PNG, TIFF) |
//! | **Transforms** | 8-bit lookup tables built from histograms |
//!
//! The module is split into:
//! - **Calculations**: Pure functions building lookup tables (unit testable)
//! - **Parameters**: [`Transform`], [`StretchRange`], [`ImageExtension`]
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: The four transforms applied to a decoded image
//! - **Pipeline**: Fixed-order composition of the enabled transforms

pub mod backend;
mod calculations;
pub mod operations;
mod params;
pub mod payload;
pub mod pipeline;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use params::{ImageExtension, StretchRange, Transform};
pub use rust_backend::RustBackend;
