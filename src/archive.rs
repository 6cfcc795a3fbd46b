//! Zip packaging for multi-item downloads, and zip expansion for uploads.
//!
//! [`package`] follows a stage-then-archive sequence:
//!
//! ```text
//! files ──► staging TempDir ──► NamedTempFile (next to destination) ──► persist
//! ```
//!
//! The staging directory and the half-written archive are both temporaries
//! owned by the call, so every exit path removes them. The destination only
//! ever appears complete.

use std::collections::HashSet;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

#[derive(Error, Debug)]
pub enum PackagingError {
    #[error("Invalid archive destination {}: {reason}", .path.display())]
    Destination { path: PathBuf, reason: String },
    #[error("Duplicate archive entry: {0}")]
    DuplicateEntry(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl PackagingError {
    /// Packaging failures are reported once for the whole batch, as a bad request.
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// One file to place in an archive. `name` must be a bare filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Write `files` into a zip archive at `destination`.
///
/// The destination's parent directory must already exist. An existing file
/// at `destination` is replaced.
pub fn package(files: &[ArchiveFile], destination: &Path) -> Result<PathBuf, PackagingError> {
    package_in(files, destination, &std::env::temp_dir())
}

/// [`package`] with the staging directory created under `staging_root`.
pub fn package_in(
    files: &[ArchiveFile],
    destination: &Path,
    staging_root: &Path,
) -> Result<PathBuf, PackagingError> {
    let parent = check_destination(destination)?;

    let staging = tempfile::TempDir::new_in(staging_root)?;
    let mut seen = HashSet::new();
    for file in files {
        if !is_bare_name(&file.name) {
            return Err(PackagingError::Destination {
                path: staging.path().join(&file.name),
                reason: "entry name must be a plain filename".into(),
            });
        }
        if !seen.insert(file.name.as_str()) {
            return Err(PackagingError::DuplicateEntry(file.name.clone()));
        }
        fs::write(staging.path().join(&file.name), &file.bytes)?;
    }
    debug!(staging = %staging.path().display(), files = files.len(), "staged download files");

    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    let mut zip = ZipWriter::new(tmp);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for file in files {
        let bytes = fs::read(staging.path().join(&file.name))?;
        zip.start_file(file.name.as_str(), options)?;
        zip.write_all(&bytes)?;
    }
    let tmp = zip.finish()?;
    tmp.persist(destination)
        .map_err(|e| PackagingError::Io(e.error))?;

    info!(archive = %destination.display(), files = files.len(), "wrote archive");
    Ok(destination.to_path_buf())
}

/// Image files contained in a zip archive, as `(filename, bytes)` in archive order.
///
/// Directories, entries without an image extension, and macOS resource
/// forks (`__MACOSX/`) are skipped. Names are reduced to their last path
/// component.
pub fn unzip_images(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, PackagingError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut images = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || entry.name().starts_with("__MACOSX/") {
            continue;
        }
        let Some(name) = entry
            .name()
            .rsplit(['/', '\\'])
            .next()
            .filter(|n| crate::naming::image_extension(n).is_some())
            .map(str::to_string)
        else {
            debug!(entry = entry.name(), "skipping non-image archive entry");
            continue;
        };
        let mut buf = Vec::new();
        entry.read_to_end(&mut buf)?;
        images.push((name, buf));
    }
    Ok(images)
}

fn check_destination(destination: &Path) -> Result<&Path, PackagingError> {
    let invalid = |reason: &str| PackagingError::Destination {
        path: destination.to_path_buf(),
        reason: reason.to_string(),
    };
    if destination.file_name().is_none() {
        return Err(invalid("no file name"));
    }
    if destination.is_dir() {
        return Err(invalid("is a directory"));
    }
    let parent = match destination.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(invalid("no parent directory")),
    };
    if !parent.is_dir() {
        return Err(invalid("parent directory does not exist"));
    }
    Ok(parent)
}

fn is_bare_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
