//! Utility functions for file naming and directory sizing

use chrono::{DateTime, FixedOffset};
use std::path::Path;
use walkdir::WalkDir;

/// Default maximum length of a sanitized name, in characters
pub const DEFAULT_MAX_FILENAME_LEN: usize = 100;

/// Maximum characters of the sender kept in a message folder name
pub const MAX_SENDER_LEN: usize = 50;

/// Fallback name for attachments whose name sanitizes to nothing usable
pub const FALLBACK_ATTACHMENT_NAME: &str = "attachment";

/// Timestamp layout prefixing every message folder name
const FOLDER_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

fn is_allowed(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-')
}

/// Normalize a string into a filesystem-safe name
///
/// Keeps alphanumerics, space, `.`, `_` and `-`, truncates to `max_len`
/// characters and strips trailing whitespace. Applying it twice yields the
/// same result as applying it once.
///
/// # Examples
///
/// ```
/// use mail_archiver::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Alice <alice@example.com>", 100), "Alice aliceexample.com");
/// assert_eq!(sanitize_filename("report: Q1/Q2.pdf", 100), "report Q1Q2.pdf");
/// ```
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let truncated: String = name
        .chars()
        .filter(|c| is_allowed(*c))
        .take(max_len)
        .collect();
    truncated.trim_end().to_string()
}

/// Whether `name` is already in the sanitizer's output alphabet
pub fn is_sanitized(name: &str) -> bool {
    name.chars().all(is_allowed)
}

/// Sanitize an attachment filename, falling back to `attachment`
///
/// Names that sanitize to nothing, or to dots only, would alias the message
/// folder or its parent.
pub fn sanitize_attachment_name(name: &str) -> String {
    let sanitized = sanitize_filename(name, DEFAULT_MAX_FILENAME_LEN);
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        FALLBACK_ATTACHMENT_NAME.to_string()
    } else {
        sanitized
    }
}

/// Build the unique folder name for a message
///
/// The name is `{YYYYMMDD_HHMMSS}_{sender}_{id}` with the sender sanitized to
/// 50 characters. When that exceeds [`DEFAULT_MAX_FILENAME_LEN`] characters, or
/// the id carries characters outside the sanitizer's set, the tail is replaced
/// by the md5 hex digest of the full candidate.
pub fn build_folder_name(date: &DateTime<FixedOffset>, sender: &str, message_id: &str) -> String {
    let timestamp = date.format(FOLDER_TIMESTAMP_FORMAT).to_string();
    let candidate = format!(
        "{timestamp}_{}_{message_id}",
        sanitize_filename(sender, MAX_SENDER_LEN)
    );

    if candidate.chars().count() > DEFAULT_MAX_FILENAME_LEN || !is_sanitized(&candidate) {
        format!("{timestamp}_{:x}", md5::compute(candidate.as_bytes()))
    } else {
        candidate
    }
}

/// Total size in bytes of all regular files below `path`
pub fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}
