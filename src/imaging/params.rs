//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They sit between the
//! request side (selection vectors, download extensions, config) and the
//! pixel work in [`operations`](super::operations).
//!
//! ## Types
//!
//! - [`Transform`]: The four intensity transforms, in their fixed pipeline order.
//! - [`StretchRange`]: Percentile pair used by Contrast Stretching (default 2–98).
//! - [`ImageExtension`]: The encodings a client may download (`.jpg`, `.png`, `.tiff`).

use image::ImageFormat;
use serde::{Deserialize, Serialize};

/// One intensity transform. Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transform {
    HistogramEqualization,
    ContrastStretching,
    LogCompression,
    ReverseVideo,
}

impl Transform {
    /// All transforms in the order the pipeline applies them.
    pub const ALL: [Transform; 4] = [
        Transform::HistogramEqualization,
        Transform::ContrastStretching,
        Transform::LogCompression,
        Transform::ReverseVideo,
    ];

    /// Index of this transform's flag in a selection vector (position 0 is "original").
    pub fn position(self) -> usize {
        match self {
            Transform::HistogramEqualization => 1,
            Transform::ContrastStretching => 2,
            Transform::LogCompression => 3,
            Transform::ReverseVideo => 4,
        }
    }

    /// Human-readable step name, also accepted by the `proc_step` request field.
    pub fn name(self) -> &'static str {
        match self {
            Transform::HistogramEqualization => "Histogram Equalization",
            Transform::ContrastStretching => "Contrast Stretching",
            Transform::LogCompression => "Log Compression",
            Transform::ReverseVideo => "Reverse Video",
        }
    }
}

/// Lower/upper percentiles (0–100) mapped to the output extremes by Contrast Stretching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StretchRange {
    pub low: f64,
    pub high: f64,
}

impl Default for StretchRange {
    fn default() -> Self {
        Self {
            low: 2.0,
            high: 98.0,
        }
    }
}

/// Encodings offered for download and for storing processed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageExtension {
    Jpg,
    Png,
    Tiff,
}

impl ImageExtension {
    /// Parse a dotted extension as sent by clients: exactly `.jpg`, `.tiff` or `.png`.
    pub fn from_dotted(ext: &str) -> Option<Self> {
        match ext {
            ".jpg" => Some(ImageExtension::Jpg),
            ".tiff" => Some(ImageExtension::Tiff),
            ".png" => Some(ImageExtension::Png),
            _ => None,
        }
    }

    pub fn dotted(self) -> &'static str {
        match self {
            ImageExtension::Jpg => ".jpg",
            ImageExtension::Png => ".png",
            ImageExtension::Tiff => ".tiff",
        }
    }

    pub fn format(self) -> ImageFormat {
        match self {
            ImageExtension::Jpg => ImageFormat::Jpeg,
            ImageExtension::Png => ImageFormat::Png,
            ImageExtension::Tiff => ImageFormat::Tiff,
        }
    }

    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(ImageExtension::Jpg),
            ImageFormat::Png => Some(ImageExtension::Png),
            ImageFormat::Tiff => Some(ImageExtension::Tiff),
            _ => None,
        }
    }
}
