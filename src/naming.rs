//! Filename helpers shared by the CLI and the download packager.
//!
//! ## Path Lists
//!
//! The CLI accepts several files in one argument as a comma-separated list.
//! [`split_path_list`] trims each piece and drops empty ones, so trailing
//! commas and stray spaces are harmless:
//! - `"a.jpg, b.png,"` → `["a.jpg", "b.png"]`
//!
//! ## Archive Entry Names
//!
//! Every file in a multi-item download archive is named after the stored
//! filename's stem, the selection signature, and the requested extension:
//! - `cat.jpg` + `01100` + `.png` → `cat_01100.png`
//!
//! Names are flattened (no directories inside the archive) and made unique
//! within one archive by [`unique_name`].

use crate::imaging::ImageExtension;
use crate::signature::Signature;
use std::collections::HashSet;

/// Split a comma-separated list of paths, trimming whitespace and dropping empties.
pub fn split_path_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Filename without its last extension. Leading-dot names keep their dot.
///
/// - `"cat.jpg"` → `"cat"`
/// - `"scan.final.tiff"` → `"scan.final"`
/// - `".hidden"` → `".hidden"`
pub fn file_stem(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(0) | None => filename,
        Some(dot) => &filename[..dot],
    }
}

/// The allowed image extension implied by a filename, if any.
///
/// Case-insensitive; `.jpeg` and `.tif` count as their short forms.
pub fn image_extension(filename: &str) -> Option<ImageExtension> {
    let dot = filename.rfind('.')?;
    let ext = filename[dot..].to_ascii_lowercase();
    match ext.as_str() {
        ".jpeg" => Some(ImageExtension::Jpg),
        ".tif" => Some(ImageExtension::Tiff),
        other => ImageExtension::from_dotted(other),
    }
}

/// Archive entry name for one downloaded item, e.g. `cat_01100.png`.
pub fn archive_entry_name(filename: &str, signature: &Signature, ext: ImageExtension) -> String {
    let stem = flatten(file_stem(filename));
    format!("{stem}_{signature}{}", ext.dotted())
}

/// Return `name`, or `name` with a `-N` counter before the extension if
/// it is already taken. The returned name is added to `taken`.
pub fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }
    let stem = file_stem(name);
    let ext = &name[stem.len()..];
    let mut counter = 2;
    loop {
        let candidate = format!("{stem}-{counter}{ext}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

/// Replace path separators so a stored filename can't escape a directory.
fn flatten(name: &str) -> String {
    name.replace(['/', '\\'], "_")
}
