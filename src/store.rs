//! Per-user versioned image store.
//!
//! Every user owns two ordered lists: the original images they uploaded and
//! the processed variants derived from them. Writes are *upserts*:
//!
//! - an original is keyed by `filename`
//! - a variant is keyed by `(filename, signature)`
//!
//! Writing an existing key replaces the entry in its current list slot, so
//! list length and order are preserved and there is never more than one
//! entry per key. A new key is appended.
//!
//! # Lifecycle
//!
//! A [`VersionStore`] is an explicit handle. [`VersionStore::open`] loads the
//! JSON file backing it (or starts empty when the file does not exist),
//! [`VersionStore::save`] writes it back atomically, and
//! [`VersionStore::close`] saves and consumes the handle.
//! [`VersionStore::in_memory`] gives a handle with no backing file.
//!
//! ## Storage
//!
//! ```json
//! {
//!   "version": 1,
//!   "users": {
//!     "alice": {
//!       "username": "alice",
//!       "originals": [{ "filename": "cat.jpg", "payload": "...", ... }],
//!       "variants":  [{ "filename": "cat.jpg", "signature": "01100", ... }],
//!       "actions":   [{ "step": "Histogram Equalization", "runs": 3, ... }]
//!     }
//!   }
//! }
//! ```
//!
//! Users are kept in a sorted map so the file diffs cleanly between saves.

use crate::imaging::Dimensions;
use crate::signature::Signature;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Version of the store file format.
const STORE_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Field username cannot be empty.")]
    EmptyUsername,
    #[error("User {0} already exists.")]
    UserExists(String),
    #[error("User {0} not found.")]
    UserNotFound(String),
    #[error("File {filename} not found for user {username}.")]
    FileNotFound { username: String, filename: String },
    #[error("Variant {signature} of {filename} not found for user {username}.")]
    VariantNotFound {
        username: String,
        filename: String,
        signature: Signature,
    },
    #[error("Unsupported store version {found} (expected {expected})", expected = STORE_VERSION)]
    Version { found: u32 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// HTTP-style status for reporting this error to a client.
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::EmptyUsername | StoreError::UserExists(_) => 400,
            StoreError::UserNotFound(_)
            | StoreError::FileNotFound { .. }
            | StoreError::VariantNotFound { .. } => 404,
            StoreError::Version { .. } | StoreError::Io(_) | StoreError::Json(_) => 500,
        }
    }
}

/// An uploaded image as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OriginalEntry {
    pub filename: String,
    /// Base64 of the encoded image bytes.
    pub payload: String,
    pub size: Dimensions,
    pub timestamp: DateTime<Utc>,
}

/// A processed variant of an uploaded image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantEntry {
    pub filename: String,
    /// Base64 of the encoded, processed image bytes.
    pub payload: String,
    pub size: Dimensions,
    pub timestamp: DateTime<Utc>,
    /// Wall time spent in the transform pipeline, in milliseconds.
    pub processing_time_ms: f64,
    pub signature: Signature,
    /// [`source_digest()`] of the payload and settings this variant was computed from.
    #[serde(default)]
    pub source_digest: String,
}

/// Run count and running average latency of one transform for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStat {
    pub step: String,
    pub runs: u64,
    pub average_latency_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub originals: Vec<OriginalEntry>,
    #[serde(default)]
    pub variants: Vec<VariantEntry>,
    #[serde(default)]
    pub actions: Vec<ActionStat>,
}

impl UserRecord {
    fn new(username: &str) -> Self {
        Self {
            username: username.to_string(),
            ..Self::default()
        }
    }
}

/// Whether an upsert added a new entry or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

#[derive(Debug, Deserialize)]
struct StoreFile {
    version: u32,
    users: BTreeMap<String, UserRecord>,
}

/// Borrowed view of the store, written by `save`.
#[derive(Serialize)]
struct StoreFileRef<'a> {
    version: u32,
    users: &'a BTreeMap<String, UserRecord>,
}

/// Handle on the per-user image store.
#[derive(Debug, Default)]
pub struct VersionStore {
    path: Option<PathBuf>,
    users: BTreeMap<String, UserRecord>,
}

/// Replace the first entry matching `same_key` in place, or append.
fn upsert<T>(list: &mut Vec<T>, entry: T, same_key: impl Fn(&T) -> bool) -> Upsert {
    match list.iter_mut().find(|e| same_key(e)) {
        Some(slot) => {
            *slot = entry;
            Upsert::Replaced
        }
        None => {
            list.push(entry);
            Upsert::Inserted
        }
    }
}

/// SHA-256 over the processing settings and the source payload, as hex.
///
/// `settings` is any text that changes whenever the produced bytes would.
pub fn source_digest(payload: &str, settings: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(settings.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl VersionStore {
    /// A store with no backing file; `save` is a no-op.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store backed by `path`. A missing file yields an empty store.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let users = match std::fs::read_to_string(path) {
            Ok(content) => {
                let file: StoreFile = serde_json::from_str(&content)?;
                if file.version != STORE_VERSION {
                    return Err(StoreError::Version {
                        found: file.version,
                    });
                }
                file.users
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), users = users.len(), "opened store");
        Ok(Self {
            path: Some(path.to_path_buf()),
            users,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write the store to its backing file, replacing it atomically.
    pub fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;
        let file = StoreFileRef {
            version: STORE_VERSION,
            users: &self.users,
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, &file)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
        debug!(path = %path.display(), "saved store");
        Ok(())
    }

    /// Save and release the handle.
    pub fn close(self) -> Result<(), StoreError> {
        self.save()
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub fn create_user(&mut self, username: &str) -> Result<(), StoreError> {
        if username.is_empty() {
            return Err(StoreError::EmptyUsername);
        }
        if self.users.contains_key(username) {
            return Err(StoreError::UserExists(username.to_string()));
        }
        self.users
            .insert(username.to_string(), UserRecord::new(username));
        info!(user = username, "registered user");
        Ok(())
    }

    /// Remove a user together with every entry they own.
    pub fn delete_user(&mut self, username: &str) -> Result<(), StoreError> {
        if self.users.remove(username).is_none() {
            return Err(StoreError::UserNotFound(username.to_string()));
        }
        info!(user = username, "deleted user");
        Ok(())
    }

    pub fn contains_user(&self, username: &str) -> bool {
        self.users.contains_key(username)
    }

    pub fn user(&self, username: &str) -> Result<&UserRecord, StoreError> {
        self.users
            .get(username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    fn user_mut(&mut self, username: &str) -> Result<&mut UserRecord, StoreError> {
        self.users
            .get_mut(username)
            .ok_or_else(|| StoreError::UserNotFound(username.to_string()))
    }

    pub fn usernames(&self) -> impl Iterator<Item = &str> {
        self.users.keys().map(String::as_str)
    }

    // =========================================================================
    // Entries
    // =========================================================================

    pub fn upsert_original(
        &mut self,
        username: &str,
        entry: OriginalEntry,
    ) -> Result<Upsert, StoreError> {
        let user = self.user_mut(username)?;
        let filename = entry.filename.clone();
        let outcome = upsert(&mut user.originals, entry, |e| e.filename == filename);
        debug!(user = username, filename = %filename, ?outcome, "upserted original");
        Ok(outcome)
    }

    pub fn upsert_variant(
        &mut self,
        username: &str,
        entry: VariantEntry,
    ) -> Result<Upsert, StoreError> {
        let user = self.user_mut(username)?;
        let filename = entry.filename.clone();
        let signature = entry.signature.clone();
        let outcome = upsert(&mut user.variants, entry, |e| {
            e.filename == filename && e.signature == signature
        });
        debug!(user = username, filename = %filename, %signature, ?outcome, "upserted variant");
        Ok(outcome)
    }

    pub fn get_original(&self, username: &str, filename: &str) -> Result<&OriginalEntry, StoreError> {
        self.user(username)?
            .originals
            .iter()
            .find(|e| e.filename == filename)
            .ok_or_else(|| StoreError::FileNotFound {
                username: username.to_string(),
                filename: filename.to_string(),
            })
    }

    pub fn get_variant(
        &self,
        username: &str,
        filename: &str,
        signature: &Signature,
    ) -> Result<&VariantEntry, StoreError> {
        self.user(username)?
            .variants
            .iter()
            .find(|e| e.filename == filename && &e.signature == signature)
            .ok_or_else(|| StoreError::VariantNotFound {
                username: username.to_string(),
                filename: filename.to_string(),
                signature: signature.clone(),
            })
    }

    /// Remove the original and every variant named `filename`.
    ///
    /// Returns how many entries were removed; removing nothing is `FileNotFound`.
    pub fn delete_filename(&mut self, username: &str, filename: &str) -> Result<usize, StoreError> {
        let user = self.user_mut(username)?;
        let before = user.originals.len() + user.variants.len();
        user.originals.retain(|e| e.filename != filename);
        user.variants.retain(|e| e.filename != filename);
        let removed = before - (user.originals.len() + user.variants.len());
        if removed == 0 {
            return Err(StoreError::FileNotFound {
                username: username.to_string(),
                filename: filename.to_string(),
            });
        }
        info!(user = username, filename, removed, "deleted file");
        Ok(removed)
    }

    // =========================================================================
    // Action statistics
    // =========================================================================

    /// Fold one run of `step` taking `latency` into the user's running average.
    pub fn record_action(
        &mut self,
        username: &str,
        step: &str,
        latency: Duration,
    ) -> Result<(), StoreError> {
        let user = self.user_mut(username)?;
        let ms = latency.as_secs_f64() * 1000.0;
        match user.actions.iter_mut().find(|a| a.step == step) {
            Some(stat) => {
                stat.runs += 1;
                stat.average_latency_ms += (ms - stat.average_latency_ms) / stat.runs as f64;
            }
            None => user.actions.push(ActionStat {
                step: step.to_string(),
                runs: 1,
                average_latency_ms: ms,
            }),
        }
        Ok(())
    }

    pub fn actions(&self, username: &str) -> Result<&[ActionStat], StoreError> {
        Ok(&self.user(username)?.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn original(filename: &str, payload: &str) -> OriginalEntry {
        OriginalEntry {
            filename: filename.into(),
            payload: payload.into(),
            size: Dimensions {
                width: 1,
                height: 1,
            },
            timestamp: Utc::now(),
        }
    }

    fn variant(filename: &str, sig: &str, payload: &str) -> VariantEntry {
        VariantEntry {
            filename: filename.into(),
            payload: payload.into(),
            size: Dimensions {
                width: 1,
                height: 1,
            },
            timestamp: Utc::now(),
            processing_time_ms: 1.5,
            signature: sig.parse().unwrap(),
            source_digest: source_digest("src", ""),
        }
    }

    fn store_with_user(name: &str) -> VersionStore {
        let mut store = VersionStore::in_memory();
        store.create_user(name).unwrap();
        store
    }

    // =========================================================================
    // Users
    // =========================================================================

    #[test]
    fn create_user_rejects_empty_and_duplicate() {
        let mut store = VersionStore::in_memory();
        assert!(matches!(store.create_user(""), Err(StoreError::EmptyUsername)));
        store.create_user("alice").unwrap();
        let err = store.create_user("alice").unwrap_err();
        assert!(matches!(err, StoreError::UserExists(_)));
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn delete_user_removes_everything() {
        let mut store = store_with_user("alice");
        store.upsert_original("alice", original("a.jpg", "AA==")).unwrap();
        store.delete_user("alice").unwrap();
        assert!(!store.contains_user("alice"));
        assert!(matches!(
            store.get_original("alice", "a.jpg"),
            Err(StoreError::UserNotFound(_))
        ));
    }

    #[test]
    fn delete_unknown_user_is_not_found() {
        let mut store = VersionStore::in_memory();
        let err = store.delete_user("ghost").unwrap_err();
        assert!(matches!(err, StoreError::UserNotFound(_)));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn upsert_for_unknown_user_fails() {
        let mut store = VersionStore::in_memory();
        assert!(matches!(
            store.upsert_original("ghost", original("a.jpg", "AA==")),
            Err(StoreError::UserNotFound(_))
        ));
    }

    // =========================================================================
    // Upsert semantics
    // =========================================================================

    #[test]
    fn upsert_original_replaces_in_place() {
        let mut store = store_with_user("u");
        store.upsert_original("u", original("a.jpg", "AAAA")).unwrap();
        store.upsert_original("u", original("b.jpg", "BBBB")).unwrap();

        let outcome = store.upsert_original("u", original("a.jpg", "CCCC")).unwrap();
        assert_eq!(outcome, Upsert::Replaced);

        let user = store.user("u").unwrap();
        assert_eq!(user.originals.len(), 2);
        assert_eq!(user.originals[0].filename, "a.jpg");
        assert_eq!(user.originals[0].payload, "CCCC");
        assert_eq!(user.originals[1].filename, "b.jpg");
    }

    #[test]
    fn upsert_variant_keys_on_filename_and_signature() {
        let mut store = store_with_user("u");
        assert_eq!(
            store.upsert_variant("u", variant("a.jpg", "01100", "P1")).unwrap(),
            Upsert::Inserted
        );
        assert_eq!(
            store.upsert_variant("u", variant("a.jpg", "00001", "P2")).unwrap(),
            Upsert::Inserted
        );
        assert_eq!(
            store.upsert_variant("u", variant("a.jpg", "01100", "P3")).unwrap(),
            Upsert::Replaced
        );

        let user = store.user("u").unwrap();
        assert_eq!(user.variants.len(), 2);
        let sig: Signature = "01100".parse().unwrap();
        assert_eq!(store.get_variant("u", "a.jpg", &sig).unwrap().payload, "P3");
        assert_eq!(user.variants[0].signature, sig);
    }

    #[test]
    fn repeated_upserts_leave_one_entry_with_latest_payload() {
        let mut store = store_with_user("u");
        for i in 0..5 {
            store
                .upsert_original("u", original("x.png", &format!("p{i}")))
                .unwrap();
        }
        let user = store.user("u").unwrap();
        assert_eq!(user.originals.len(), 1);
        assert_eq!(user.originals[0].payload, "p4");
    }

    #[test]
    fn get_missing_entries() {
        let store = store_with_user("u");
        assert!(matches!(
            store.get_original("u", "missing.jpg"),
            Err(StoreError::FileNotFound { .. })
        ));
        let sig: Signature = "10000".parse().unwrap();
        let err = store.get_variant("u", "missing.jpg", &sig).unwrap_err();
        assert!(matches!(err, StoreError::VariantNotFound { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn delete_filename_removes_original_and_all_variants() {
        let mut store = store_with_user("u");
        store.upsert_original("u", original("a.jpg", "A")).unwrap();
        store.upsert_original("u", original("b.jpg", "B")).unwrap();
        store.upsert_variant("u", variant("a.jpg", "01000", "1")).unwrap();
        store.upsert_variant("u", variant("a.jpg", "00010", "2")).unwrap();
        store.upsert_variant("u", variant("b.jpg", "00010", "3")).unwrap();

        assert_eq!(store.delete_filename("u", "a.jpg").unwrap(), 3);

        let user = store.user("u").unwrap();
        assert_eq!(user.originals.len(), 1);
        assert_eq!(user.variants.len(), 1);
        assert_eq!(user.variants[0].filename, "b.jpg");

        assert!(matches!(
            store.delete_filename("u", "a.jpg"),
            Err(StoreError::FileNotFound { .. })
        ));
    }

    // =========================================================================
    // Action statistics
    // =========================================================================

    #[test]
    fn record_action_keeps_running_average() {
        let mut store = store_with_user("u");
        store
            .record_action("u", "Log Compression", Duration::from_millis(10))
            .unwrap();
        store
            .record_action("u", "Log Compression", Duration::from_millis(30))
            .unwrap();
        store
            .record_action("u", "Reverse Video", Duration::from_millis(4))
            .unwrap();

        let actions = store.actions("u").unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].runs, 2);
        assert!((actions[0].average_latency_ms - 20.0).abs() < 1e-9);
        assert_eq!(actions[1].step, "Reverse Video");
    }

    // =========================================================================
    // Open / save / close
    // =========================================================================

    #[test]
    fn open_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = VersionStore::open(&tmp.path().join("store.json")).unwrap();
        assert_eq!(store.usernames().count(), 0);
    }

    #[test]
    fn close_and_reopen_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/store.json");

        let mut store = VersionStore::open(&path).unwrap();
        store.create_user("alice").unwrap();
        store.upsert_original("alice", original("a.jpg", "AA==")).unwrap();
        store.upsert_variant("alice", variant("a.jpg", "00001", "BB==")).unwrap();
        store.close().unwrap();

        let reopened = VersionStore::open(&path).unwrap();
        let user = reopened.user("alice").unwrap();
        assert_eq!(user.originals[0].payload, "AA==");
        assert_eq!(user.variants[0].signature.as_str(), "00001");
    }

    #[test]
    fn save_writes_versioned_file_and_keeps_handle_usable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        let mut store = VersionStore::open(&path).unwrap();
        store.create_user("alice").unwrap();
        store.upsert_original("alice", original("a.jpg", "AA==")).unwrap();
        store.save().unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["version"], STORE_VERSION);
        assert_eq!(written["users"]["alice"]["originals"][0]["payload"], "AA==");

        store.upsert_original("alice", original("b.jpg", "BB==")).unwrap();
        store.save().unwrap();
        let reopened = VersionStore::open(&path).unwrap();
        assert_eq!(reopened.user("alice").unwrap().originals.len(), 2);
    }

    #[test]
    fn open_corrupt_file_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(VersionStore::open(&path), Err(StoreError::Json(_))));
    }

    #[test]
    fn open_wrong_version_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store.json");
        std::fs::write(&path, r#"{"version": 99, "users": {}}"#).unwrap();
        assert!(matches!(
            VersionStore::open(&path),
            Err(StoreError::Version { found: 99 })
        ));
    }

    #[test]
    fn in_memory_save_is_noop() {
        let store = store_with_user("u");
        store.save().unwrap();
        assert!(store.path().is_none());
    }

    #[test]
    fn source_digest_is_stable_hex() {
        let d = source_digest("abc", "png");
        assert_eq!(d, source_digest("abc", "png"));
        assert_ne!(d, source_digest("abd", "png"));
        assert_ne!(d, source_digest("abc", "tiff"));
        assert_eq!(d.len(), 64);
    }
}
