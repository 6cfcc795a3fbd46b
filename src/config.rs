//! Application configuration module.
//!
//! Handles loading, validating, and merging `imgvault.toml`. Stock defaults
//! form the base layer; the user's file only needs the keys it overrides.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [store]
//! path = "imgvault-store.json"   # JSON file backing the version store
//!
//! [validation]
//! flags = "strict"               # "strict" or "coercing" (accepts 0/1)
//!
//! [processing]
//! stretch_low_percentile = 2.0
//! stretch_high_percentile = 98.0
//! variant_format = "png"         # png | jpg | tiff
//! reuse_unchanged = true
//!
//! [download]
//! archive_name = "images.zip"
//! ```
//!
//! ## Partial Configuration
//!
//! ```toml
//! # Only switch to coercing flag validation
//! [validation]
//! flags = "coercing"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{ImageExtension, StretchRange};
use crate::validate::FlagMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `imgvault.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Where the version store lives.
    pub store: StoreConfig,
    /// Batch validator behaviour.
    pub validation: ValidationConfig,
    /// Transform parameters and variant encoding.
    pub processing: ProcessingConfig,
    /// Multi-item download packaging.
    pub download: DownloadConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.processing;
        for (key, value) in [
            ("stretch_low_percentile", p.stretch_low_percentile),
            ("stretch_high_percentile", p.stretch_high_percentile),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "processing.{key} must be 0-100"
                )));
            }
        }
        if p.stretch_low_percentile >= p.stretch_high_percentile {
            return Err(ConfigError::Validation(
                "processing.stretch_low_percentile must be below stretch_high_percentile".into(),
            ));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(ConfigError::Validation("store.path must not be empty".into()));
        }
        if self.download.archive_name.is_empty() {
            return Err(ConfigError::Validation(
                "download.archive_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("imgvault-store.json"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Whether selection flags may be written as `0`/`1`.
    pub flags: FlagMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    pub stretch_low_percentile: f64,
    pub stretch_high_percentile: f64,
    /// Encoding used for stored processed variants.
    pub variant_format: ImageExtension,
    /// Skip the pipeline when the same source was already processed with
    /// the same signature.
    pub reuse_unchanged: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let stretch = StretchRange::default();
        Self {
            stretch_low_percentile: stretch.low,
            stretch_high_percentile: stretch.high,
            variant_format: ImageExtension::Png,
            reuse_unchanged: true,
        }
    }
}

impl ProcessingConfig {
    pub fn stretch(&self) -> StretchRange {
        StretchRange {
            low: self.stretch_low_percentile,
            high: self.stretch_high_percentile,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadConfig {
    pub archive_name: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            archive_name: "images.zip".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
}

/// Lay `overlay` over `base`, descending into tables that exist in both.
///
/// A user file sets `[processing] variant_format` without losing the stock
/// percentiles next to it; any non-table value in `overlay` wins outright.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut merged), toml::Value::Table(layer)) => {
            for (key, value) in layer {
                let value = match merged.remove(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => value,
                };
                merged.insert(key, value);
            }
            toml::Value::Table(merged)
        }
        (_, replacement) => replacement,
    }
}

/// Read a config file as a raw TOML value; `Ok(None)` if it doesn't exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Load the config file at `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `imgvault.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgvault configuration
# ======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Version store
# ---------------------------------------------------------------------------
[store]
# JSON file holding every user's originals and processed variants.
path = "imgvault-store.json"

# ---------------------------------------------------------------------------
# Batch validation
# ---------------------------------------------------------------------------
[validation]
# How the five selection flags may be written:
#   "strict"   - only true / false
#   "coercing" - also the integers 0 / 1
flags = "strict"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Percentiles mapped to black and white by Contrast Stretching.
stretch_low_percentile = 2.0
stretch_high_percentile = 98.0

# Encoding of stored processed variants: "png", "jpg" or "tiff".
variant_format = "png"

# Re-use a stored variant when the same image is uploaded again with the
# same selection, instead of running the transforms again.
reuse_unchanged = true

# ---------------------------------------------------------------------------
# Downloads
# ---------------------------------------------------------------------------
[download]
# Archive file written when a download batch returns more than one image.
archive_name = "images.zip"
"##
}
