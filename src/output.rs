//! CLI output formatting for batch reports and store listings.
//!
//! # Information-First Display
//!
//! Every batch item is shown by its positional index and filename, with the
//! status code and message indented beneath it. Positions match the order
//! items were given on the command line, so a failure can be traced back to
//! its argument at a glance.
//!
//! # Output Format
//!
//! ## Upload
//!
//! ```text
//! 001 cat.jpg
//!     200 Request was successful (original stored)
//! 002 dog.png
//!     400 Field image cannot be empty.
//!
//! Upload: 1 stored, 0 reused, 1 failed (2 total)
//! ```
//!
//! ## Download
//!
//! ```text
//! 001 cat.jpg [01100]
//!     200 Request was successful
//! 002 missing.jpg [10000]
//!     404 not found
//!
//! Saved cat.jpg [01100] → ./cat_01100.png
//! ```
//!
//! ## Listing
//!
//! ```text
//! User alice
//! Originals (1)
//! 001 cat.jpg 640x480
//! Variants (1)
//! 001 cat.jpg [01100] 640x480, 12.30 ms
//! Actions
//!     Histogram Equalization: 1 run, avg 4.10 ms
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::batch::{DownloadOutput, DownloadReport, UploadOutcome, UploadReport};
use crate::imaging::Dimensions;
use crate::store::{Upsert, UserRecord};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn format_size(size: Dimensions) -> String {
    format!("{}x{}", size.width, size.height)
}

/// Status line for one item: code, message, and what happened in the store.
fn status_line(code: u16, message: &str, outcome: Option<UploadOutcome>) -> String {
    let detail = match outcome {
        Some(UploadOutcome::Original(Upsert::Inserted)) => " (original stored)",
        Some(UploadOutcome::Original(Upsert::Replaced)) => " (original replaced)",
        Some(UploadOutcome::Variant(Upsert::Inserted)) => " (variant stored)",
        Some(UploadOutcome::Variant(Upsert::Replaced)) => " (variant replaced)",
        Some(UploadOutcome::Reused) => " (variant unchanged)",
        None => "",
    };
    format!("{}{} {}{}", indent(1), code, message, detail)
}

// ============================================================================
// Upload
// ============================================================================

/// Format an upload batch report. `labels[i]` names input item `i`.
pub fn format_upload_report(labels: &[String], report: &UploadReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, code) in report.codes.iter().enumerate() {
        let label = labels.get(i).map(String::as_str).unwrap_or("?");
        let message = report.messages.get(i).map(String::as_str).unwrap_or("");
        let outcome = report.outcomes.get(i).copied().flatten();
        lines.push(format!("{} {}", format_index(i + 1), label));
        lines.push(status_line(*code, message, outcome));
    }
    lines.push(String::new());
    lines.push(format!("Upload: {}", report.stats));
    lines
}

pub fn print_upload_report(labels: &[String], report: &UploadReport) {
    for line in format_upload_report(labels, report) {
        println!("{}", line);
    }
}

// ============================================================================
// Download
// ============================================================================

/// Format a download batch report.
///
/// `saved_to` is where the CLI wrote a single returned image; archives
/// carry their own path.
pub fn format_download_report(
    labels: &[String],
    report: &DownloadReport,
    saved_to: Option<&Path>,
) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, code) in report.codes.iter().enumerate() {
        let label = labels.get(i).map(String::as_str).unwrap_or("?");
        let message = report.messages.get(i).map(String::as_str).unwrap_or("");
        lines.push(format!("{} {}", format_index(i + 1), label));
        lines.push(status_line(*code, message, None));
    }
    lines.push(String::new());
    match (&report.output, saved_to) {
        (DownloadOutput::Nothing, _) => lines.push("Nothing downloaded".to_string()),
        (DownloadOutput::Single(image), Some(path)) => lines.push(format!(
            "Saved {} [{}] → {}",
            image.filename,
            image.signature,
            path.display()
        )),
        (DownloadOutput::Single(image), None) => lines.push(format!(
            "Fetched {} [{}] ({} bytes)",
            image.filename,
            image.signature,
            image.bytes.len()
        )),
        (DownloadOutput::Archive { path, files }, _) => {
            lines.push(format!("Archived {} images → {}", files, path.display()))
        }
    }
    lines
}

pub fn print_download_report(labels: &[String], report: &DownloadReport, saved_to: Option<&Path>) {
    for line in format_download_report(labels, report, saved_to) {
        println!("{}", line);
    }
}

// ============================================================================
// Store listing
// ============================================================================

/// Format everything stored for one user.
pub fn format_user_listing(user: &UserRecord) -> Vec<String> {
    let mut lines = vec![format!("User {}", user.username)];

    lines.push(format!("Originals ({})", user.originals.len()));
    for (i, entry) in user.originals.iter().enumerate() {
        lines.push(format!(
            "{} {} {}",
            format_index(i + 1),
            entry.filename,
            format_size(entry.size)
        ));
    }

    lines.push(format!("Variants ({})", user.variants.len()));
    for (i, entry) in user.variants.iter().enumerate() {
        lines.push(format!(
            "{} {} [{}] {}, {:.2} ms",
            format_index(i + 1),
            entry.filename,
            entry.signature,
            format_size(entry.size),
            entry.processing_time_ms
        ));
    }

    if !user.actions.is_empty() {
        lines.push("Actions".to_string());
        for stat in &user.actions {
            let runs = if stat.runs == 1 { "run" } else { "runs" };
            lines.push(format!(
                "{}{}: {} {}, avg {:.2} ms",
                indent(1),
                stat.step,
                stat.runs,
                runs,
                stat.average_latency_ms
            ));
        }
    }
    lines
}

pub fn print_user_listing(user: &UserRecord) {
    for line in format_user_listing(user) {
        println!("{}", line);
    }
}

/// Format the registered usernames, one per line.
pub fn format_user_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let names: Vec<&str> = names.collect();
    let mut lines = vec![format!("Users ({})", names.len())];
    lines.extend(
        names
            .iter()
            .enumerate()
            .map(|(i, name)| format!("{} {}", format_index(i + 1), name)),
    );
    lines
}

pub fn print_user_names<'a>(names: impl Iterator<Item = &'a str>) {
    for line in format_user_names(names) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchStats, FetchedImage};
    use crate::imaging::ImageExtension;
    use crate::store::{ActionStat, OriginalEntry, VariantEntry};
    use chrono::Utc;
    use std::path::PathBuf;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // =========================================================================
    // Helper tests
    // =========================================================================

    #[test]
    fn format_index_pads_to_three_digits() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(100), "100");
    }

    #[test]
    fn status_line_describes_outcome() {
        assert_eq!(
            status_line(200, "ok", Some(UploadOutcome::Reused)),
            "    200 ok (variant unchanged)"
        );
        assert_eq!(status_line(404, "not found", None), "    404 not found");
    }

    // =========================================================================
    // Upload report tests
    // =========================================================================

    #[test]
    fn upload_report_lists_items_and_summary() {
        let report = UploadReport {
            codes: vec![200, 400],
            messages: vec![
                "Request was successful".into(),
                "Field image cannot be empty.".into(),
            ],
            outcomes: vec![Some(UploadOutcome::Original(Upsert::Inserted)), None],
            stats: BatchStats {
                stored: 1,
                reused: 0,
                failed: 1,
            },
        };
        let lines = format_upload_report(&labels(&["cat.jpg", "dog.png"]), &report);
        assert_eq!(
            lines,
            vec![
                "001 cat.jpg",
                "    200 Request was successful (original stored)",
                "002 dog.png",
                "    400 Field image cannot be empty.",
                "",
                "Upload: 1 stored, 0 reused, 1 failed (2 total)",
            ]
        );
    }

    // =========================================================================
    // Download report tests
    // =========================================================================

    #[test]
    fn download_report_single_saved() {
        let report = DownloadReport {
            codes: vec![200],
            messages: vec!["Request was successful".into()],
            output: DownloadOutput::Single(FetchedImage {
                filename: "cat.jpg".into(),
                signature: "01100".parse().unwrap(),
                extension: ImageExtension::Png,
                bytes: vec![1, 2, 3],
            }),
        };
        let lines = format_download_report(
            &labels(&["cat.jpg [01100]"]),
            &report,
            Some(Path::new("out/cat_01100.png")),
        );
        assert_eq!(lines.last().unwrap(), "Saved cat.jpg [01100] → out/cat_01100.png");
    }

    #[test]
    fn download_report_archive() {
        let report = DownloadReport {
            codes: vec![200, 404, 200],
            messages: vec!["ok".into(), "not found".into(), "ok".into()],
            output: DownloadOutput::Archive {
                path: PathBuf::from("images.zip"),
                files: 2,
            },
        };
        let lines = format_download_report(&labels(&["a", "b", "c"]), &report, None);
        assert_eq!(lines[3], "    404 not found");
        assert_eq!(lines.last().unwrap(), "Archived 2 images → images.zip");
    }

    #[test]
    fn download_report_nothing() {
        let report = DownloadReport {
            codes: vec![404],
            messages: vec!["not found".into()],
            output: DownloadOutput::Nothing,
        };
        let lines = format_download_report(&labels(&["a"]), &report, None);
        assert_eq!(lines.last().unwrap(), "Nothing downloaded");
    }

    // =========================================================================
    // Listing tests
    // =========================================================================

    #[test]
    fn user_listing_shows_entries_and_actions() {
        let size = Dimensions {
            width: 640,
            height: 480,
        };
        let user = UserRecord {
            username: "alice".into(),
            originals: vec![OriginalEntry {
                filename: "cat.jpg".into(),
                payload: String::new(),
                size,
                timestamp: Utc::now(),
            }],
            variants: vec![VariantEntry {
                filename: "cat.jpg".into(),
                payload: String::new(),
                size,
                timestamp: Utc::now(),
                processing_time_ms: 12.3,
                signature: "01100".parse().unwrap(),
                source_digest: String::new(),
            }],
            actions: vec![ActionStat {
                step: "Histogram Equalization".into(),
                runs: 1,
                average_latency_ms: 4.1,
            }],
        };
        assert_eq!(
            format_user_listing(&user),
            vec![
                "User alice",
                "Originals (1)",
                "001 cat.jpg 640x480",
                "Variants (1)",
                "001 cat.jpg [01100] 640x480, 12.30 ms",
                "Actions",
                "    Histogram Equalization: 1 run, avg 4.10 ms",
            ]
        );
    }

    #[test]
    fn user_listing_without_actions_omits_section() {
        let user = UserRecord {
            username: "bob".into(),
            ..Default::default()
        };
        assert_eq!(
            format_user_listing(&user),
            vec!["User bob", "Originals (0)", "Variants (0)"]
        );
    }

    #[test]
    fn user_names_are_indexed() {
        assert_eq!(
            format_user_names(["alice", "bob"].into_iter()),
            vec!["Users (2)", "001 alice", "002 bob"]
        );
    }
}
