//! Batch orchestration: the upload and download loops.
//!
//! A batch is a list of loosely-typed items. Each item is validated, then
//! dispatched on its own; a failing item is recorded and the loop moves on.
//! Results come back as two index-aligned lists, `codes` and `messages`,
//! one entry per input item in input order.
//!
//! ## Upload
//!
//! ```text
//! item ─► validate ─► user exists? ─┬─ original only ─► decode ─► upsert_original
//!                                   └─ transforms ───► reuse? ─► decode ─► pipeline ─► encode ─► upsert_variant
//! ```
//!
//! A variant remembers a SHA-256 over the payload it was computed from and
//! the processing settings in effect (stretch percentiles, variant format).
//! Uploading the same payload again with the same selection and settings
//! re-upserts the stored variant instead of running the transforms again.
//!
//! ## Download
//!
//! Each item resolves to the stored original (no transform flags set) or to
//! the variant stored under the item's signature, re-encoded when the
//! requested extension differs from the stored encoding. One success is
//! returned as bytes; two or more are packaged into a zip archive at the
//! caller's destination.

use crate::archive::{self, ArchiveFile, PackagingError};
use crate::config::AppConfig;
use crate::imaging::payload::{from_base64, to_base64};
use crate::imaging::{BackendError, Dimensions, ImageBackend, ImageExtension, StretchRange, pipeline};
use crate::naming;
use crate::signature::{SelectionVector, Signature};
use crate::store::{OriginalEntry, StoreError, Upsert, VariantEntry, VersionStore, source_digest};
use crate::validate::{DownloadItem, FlagMode, UploadItem, ValidationError, Validator};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Message recorded for every successful item.
pub const SUCCESS_MESSAGE: &str = "Request was successful";
/// Message recorded for a download item with nothing stored under it.
pub const NOT_FOUND_MESSAGE: &str = "not found";

/// Why a single item failed.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ItemError {
    pub fn status_code(&self) -> u16 {
        match self {
            ItemError::Validation(_) => 400,
            ItemError::Store(e) => e.status_code(),
            ItemError::Backend(BackendError::Decode(_)) => 400,
            ItemError::Backend(_) => 500,
        }
    }
}

/// Knobs the orchestrator takes from configuration.
#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub stretch: StretchRange,
    pub variant_format: ImageExtension,
    pub reuse_unchanged: bool,
    pub flags: FlagMode,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for BatchOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            stretch: config.processing.stretch(),
            variant_format: config.processing.variant_format,
            reuse_unchanged: config.processing.reuse_unchanged,
            flags: config.validation.flags,
        }
    }
}

impl BatchOptions {
    /// The settings that shape a processed variant's bytes, as digest input.
    fn processing_settings(&self) -> String {
        format!(
            "stretch={}-{};format={}",
            self.stretch.low,
            self.stretch.high,
            self.variant_format.dotted()
        )
    }
}

/// What a successful upload did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Original(Upsert),
    Variant(Upsert),
    /// Same source and signature as the stored variant; transforms skipped.
    Reused,
}

/// Per-batch counts, summarized after the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub stored: usize,
    pub reused: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn total(&self) -> usize {
        self.stored + self.reused + self.failed
    }
}

impl fmt::Display for BatchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stored, {} reused, {} failed ({} total)",
            self.stored,
            self.reused,
            self.failed,
            self.total()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadReport {
    pub codes: Vec<u16>,
    pub messages: Vec<String>,
    pub outcomes: Vec<Option<UploadOutcome>>,
    pub stats: BatchStats,
}

/// A stored image ready to hand back to a client.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedImage {
    pub filename: String,
    pub signature: Signature,
    pub extension: ImageExtension,
    pub bytes: Vec<u8>,
}

/// The payload side of a download batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutput {
    /// No item succeeded.
    Nothing,
    /// Exactly one item succeeded; its bytes are returned directly.
    Single(FetchedImage),
    /// Several items succeeded and were packaged at this path.
    Archive { path: PathBuf, files: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownloadReport {
    pub codes: Vec<u16>,
    pub messages: Vec<String>,
    pub output: DownloadOutput,
}

/// A stored entry resolved for a selection, before any re-encoding.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'s> {
    pub payload: &'s str,
    pub size: Dimensions,
    pub timestamp: DateTime<Utc>,
    /// `None` for originals.
    pub processing_time_ms: Option<f64>,
}

/// Look up the entry a selection refers to: the original when no transform
/// flag is set, otherwise the variant stored under the full signature.
pub fn resolve<'s>(
    store: &'s VersionStore,
    username: &str,
    filename: &str,
    selection: &SelectionVector,
) -> Result<Resolved<'s>, StoreError> {
    if selection.has_no_transforms() {
        let entry = store.get_original(username, filename)?;
        Ok(Resolved {
            payload: &entry.payload,
            size: entry.size,
            timestamp: entry.timestamp,
            processing_time_ms: None,
        })
    } else {
        let entry = store.get_variant(username, filename, &selection.signature())?;
        Ok(Resolved {
            payload: &entry.payload,
            size: entry.size,
            timestamp: entry.timestamp,
            processing_time_ms: Some(entry.processing_time_ms),
        })
    }
}

/// Runs batches against one store with one backend.
pub struct Orchestrator<'a, B: ImageBackend> {
    store: &'a mut VersionStore,
    backend: &'a B,
    options: BatchOptions,
    validator: Validator,
}

impl<'a, B: ImageBackend> Orchestrator<'a, B> {
    pub fn new(store: &'a mut VersionStore, backend: &'a B, options: BatchOptions) -> Self {
        Self {
            store,
            backend,
            options,
            validator: Validator::new(options.flags),
        }
    }

    pub fn store(&self) -> &VersionStore {
        &*self.store
    }

    // =========================================================================
    // Upload
    // =========================================================================

    pub fn upload_batch(&mut self, username: &str, items: &[Value]) -> UploadReport {
        let mut report = UploadReport::default();
        for (index, item) in items.iter().enumerate() {
            let result = self
                .validator
                .validate_upload(item)
                .map_err(ItemError::from)
                .and_then(|valid| self.upload_one(username, &valid));
            match result {
                Ok(outcome) => {
                    debug!(index, ?outcome, "upload item stored");
                    match outcome {
                        UploadOutcome::Reused => report.stats.reused += 1,
                        _ => report.stats.stored += 1,
                    }
                    report.codes.push(200);
                    report.messages.push(SUCCESS_MESSAGE.to_string());
                    report.outcomes.push(Some(outcome));
                }
                Err(e) => {
                    warn!(index, user = username, error = %e, "upload item failed");
                    report.stats.failed += 1;
                    report.codes.push(e.status_code());
                    report.messages.push(e.to_string());
                    report.outcomes.push(None);
                }
            }
        }
        info!(user = username, stats = %report.stats, "upload batch finished");
        report
    }

    /// Store one validated upload item.
    pub fn upload_one(&mut self, username: &str, item: &UploadItem) -> Result<UploadOutcome, ItemError> {
        self.store.user(username)?;

        if item.selection.is_original_only() {
            let image = self.backend.decode(&from_base64(&item.payload)?)?;
            let entry = OriginalEntry {
                filename: item.filename.clone(),
                payload: item.payload.clone(),
                size: Dimensions::from(&image),
                timestamp: Utc::now(),
            };
            let upsert = self.store.upsert_original(username, entry)?;
            return Ok(UploadOutcome::Original(upsert));
        }

        let signature = item.selection.signature();
        let digest = source_digest(&item.payload, &self.options.processing_settings());
        if self.options.reuse_unchanged {
            if let Some(reusable) = self.reusable_variant(username, &item.filename, &signature, &digest) {
                self.store.upsert_variant(username, reusable)?;
                debug!(user = username, filename = %item.filename, %signature, "reused stored variant");
                return Ok(UploadOutcome::Reused);
            }
        }

        let image = self.backend.decode(&from_base64(&item.payload)?)?;
        let (processed, timings) = pipeline::run_timed(image, &item.selection, self.options.stretch);
        let bytes = self.backend.encode(&processed, self.options.variant_format)?;
        let processing_time_ms = timings
            .iter()
            .map(|(_, d)| d.as_secs_f64() * 1000.0)
            .sum();

        let entry = VariantEntry {
            filename: item.filename.clone(),
            payload: to_base64(&bytes),
            size: Dimensions::from(&processed),
            timestamp: Utc::now(),
            processing_time_ms,
            signature,
            source_digest: digest,
        };
        let upsert = self.store.upsert_variant(username, entry)?;
        for (step, latency) in timings {
            self.store.record_action(username, step.name(), latency)?;
        }
        Ok(UploadOutcome::Variant(upsert))
    }

    fn reusable_variant(
        &self,
        username: &str,
        filename: &str,
        signature: &Signature,
        digest: &str,
    ) -> Option<VariantEntry> {
        let existing = self.store.get_variant(username, filename, signature).ok()?;
        (existing.source_digest == digest).then(|| VariantEntry {
            timestamp: Utc::now(),
            ..existing.clone()
        })
    }

    // =========================================================================
    // Download
    // =========================================================================

    /// Fetch every item; package the results at `destination` if more than one succeeded.
    ///
    /// A packaging failure fails the whole batch and leaves nothing at `destination`.
    pub fn download_batch(
        &self,
        username: &str,
        items: &[Value],
        destination: &Path,
    ) -> Result<DownloadReport, PackagingError> {
        let mut codes = Vec::with_capacity(items.len());
        let mut messages = Vec::with_capacity(items.len());
        let mut fetched = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let result = self
                .validator
                .validate_download(item)
                .map_err(ItemError::from)
                .and_then(|valid| self.fetch(username, &valid));
            match result {
                Ok(image) => {
                    codes.push(200);
                    messages.push(SUCCESS_MESSAGE.to_string());
                    fetched.push(image);
                }
                Err(e) => {
                    let code = e.status_code();
                    warn!(index, user = username, error = %e, "download item failed");
                    codes.push(code);
                    messages.push(if code == 404 {
                        NOT_FOUND_MESSAGE.to_string()
                    } else {
                        e.to_string()
                    });
                }
            }
        }

        let output = if fetched.len() > 1 {
            let files = fetched.len();
            let mut taken = HashSet::new();
            let entries: Vec<ArchiveFile> = fetched
                .into_iter()
                .map(|image| ArchiveFile {
                    name: naming::unique_name(
                        &naming::archive_entry_name(&image.filename, &image.signature, image.extension),
                        &mut taken,
                    ),
                    bytes: image.bytes,
                })
                .collect();
            let path = archive::package(&entries, destination)?;
            DownloadOutput::Archive { path, files }
        } else {
            fetched
                .pop()
                .map_or(DownloadOutput::Nothing, DownloadOutput::Single)
        };
        info!(user = username, items = items.len(), "download batch finished");
        Ok(DownloadReport {
            codes,
            messages,
            output,
        })
    }

    /// Resolve one validated download item and encode it as requested.
    pub fn fetch(&self, username: &str, item: &DownloadItem) -> Result<FetchedImage, ItemError> {
        let resolved = resolve(&*self.store, username, &item.filename, &item.selection)?;
        let stored = from_base64(resolved.payload)?;
        let bytes = if self.backend.detect_format(&stored) == Some(item.extension) {
            stored
        } else {
            let image = self.backend.decode(&stored)?;
            self.backend.encode(&image, item.extension)?
        };
        Ok(FetchedImage {
            filename: item.filename.clone(),
            signature: item.selection.signature(),
            extension: item.extension,
            bytes,
        })
    }
}
