//! Disk writer for decoded messages
//!
//! Blocking I/O; callers run [`write_batch`] on `spawn_blocking`.

use std::fs;
use std::path::Path;

use crate::error::Error;
use crate::types::{DecodedMessage, MessageId, MimeKind};

/// Name of the per-message header dump
pub const HEADERS_FILE: &str = "headers.txt";

/// A message that could not be written
#[derive(Debug)]
pub struct WriteFailure {
    /// Message that failed
    pub message_id: MessageId,
    /// The [`Error::Write`] describing the folder and cause
    pub error: Error,
}

/// Outcome of writing one batch
#[derive(Debug, Default)]
pub struct WriteReport {
    /// Ids whose folders were fully written
    pub written: Vec<MessageId>,
    /// Per-message failures, in batch order
    pub failures: Vec<WriteFailure>,
    /// Attachment files written
    pub attachments_saved: u64,
    /// Bytes written across all files
    pub bytes_written: u64,
}

impl WriteReport {
    /// Fold another report into this one
    pub fn merge(&mut self, other: WriteReport) {
        self.written.extend(other.written);
        self.failures.extend(other.failures);
        self.attachments_saved += other.attachments_saved;
        self.bytes_written += other.bytes_written;
    }
}

/// Write every message in `batch` under `root`
///
/// A failing message is recorded and the rest of the batch continues.
pub fn write_batch(batch: &[DecodedMessage], root: &Path) -> WriteReport {
    let mut report = WriteReport::default();

    for message in batch {
        match write_message(message, root) {
            Ok((attachments, bytes)) => {
                report.written.push(message.message_id.clone());
                report.attachments_saved += attachments;
                report.bytes_written += bytes;
            }
            Err(source) => {
                tracing::error!(
                    message_id = %message.message_id,
                    folder = %message.folder_name,
                    error = %source,
                    "failed to write message"
                );
                report.failures.push(WriteFailure {
                    message_id: message.message_id.clone(),
                    error: Error::Write {
                        folder: message.folder_name.clone(),
                        source,
                    },
                });
            }
        }
    }

    report
}

/// Render the header dump: summary lines, then every header in order
pub fn render_headers(message: &DecodedMessage) -> String {
    let mut out = format!(
        "From: {}\nDate: {}\nSubject: {}\n",
        message.sender, message.raw_date, message.subject
    );
    for (name, value) in &message.headers {
        out.push_str(&format!("{name}: {value}\n"));
    }
    out
}

fn body_text(message: &DecodedMessage, kind: MimeKind) -> Option<String> {
    let mut parts = message
        .body_parts
        .iter()
        .filter(|p| p.kind == kind)
        .map(|p| p.text.as_str())
        .peekable();
    parts.peek()?;
    Some(parts.collect())
}

fn write_message(message: &DecodedMessage, root: &Path) -> std::io::Result<(u64, u64)> {
    let folder = root.join(&message.folder_name);
    fs::create_dir_all(&folder)?;

    let mut bytes = 0u64;
    let mut write = |name: &str, data: &[u8]| -> std::io::Result<()> {
        fs::write(folder.join(name), data)?;
        bytes += data.len() as u64;
        Ok(())
    };

    for kind in [MimeKind::Plain, MimeKind::Html] {
        if let Some(text) = body_text(message, kind) {
            write(kind.file_name(), text.as_bytes())?;
        }
    }
    write(HEADERS_FILE, render_headers(message).as_bytes())?;

    for attachment in &message.attachments {
        write(&attachment.filename, &attachment.data)?;
    }

    Ok((message.attachments.len() as u64, bytes))
}
