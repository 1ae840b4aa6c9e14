//! Core types for mail-archiver

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Opaque message handle issued by the remote mailbox
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new MessageId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive calendar date range with `start <= end`
///
/// Deserialization goes through [`DateRange::new`], so a reversed range is
/// rejected there too.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = Error;

    fn try_from(raw: RawDateRange) -> Result<Self> {
        Self::new(raw.start, raw.end)
    }
}

impl DateRange {
    /// Date format accepted by [`DateRange::parse`] (e.g. `03-01-2024`)
    pub const INPUT_FORMAT: &'static str = "%m-%d-%Y";

    /// Create a range, rejecting `start > end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// Parse a range from two `MM-DD-YYYY` strings
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |key: &str, value: &str| {
            NaiveDate::parse_from_str(value.trim(), Self::INPUT_FORMAT).map_err(|e| {
                Error::config(key, format!("'{value}' is not a MM-DD-YYYY date: {e}"))
            })
        };
        Self::new(parse("start_date", start)?, parse("end_date", end)?)
    }

    /// First day of the range
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day of the range (inclusive)
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Whether `date` falls inside the range
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// One calendar month of work, with query bounds clipped to the global range
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    /// Calendar year
    pub year: i32,
    /// Calendar month (1-12)
    pub month: u32,
    /// First day to query (inclusive)
    pub effective_start: NaiveDate,
    /// Day after the last day to query (exclusive)
    pub effective_end: NaiveDate,
}

impl Partition {
    /// Ledger key and on-disk subpath, e.g. `2024/03`
    pub fn key(&self) -> String {
        format!("{}/{:02}", self.year, self.month)
    }

    /// Folder holding this partition's uncompressed messages
    pub fn folder(&self, root: &Path) -> PathBuf {
        root.join(self.year.to_string())
            .join(format!("{:02}", self.month))
    }

    /// Whether the partition is the month containing `date`
    pub fn contains_month_of(&self, date: NaiveDate) -> bool {
        self.year == date.year() && self.month == date.month()
    }
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{:02}", self.year, self.month)
    }
}

/// Kind of a decoded body part
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MimeKind {
    /// text/plain
    Plain,
    /// text/html
    Html,
}

impl MimeKind {
    /// Map a lowercase mimetype to a body kind
    pub fn from_mimetype(mimetype: &str) -> Option<Self> {
        match mimetype {
            "text/plain" => Some(MimeKind::Plain),
            "text/html" => Some(MimeKind::Html),
            _ => None,
        }
    }

    /// File the part is written to inside a message folder
    pub fn file_name(&self) -> &'static str {
        match self {
            MimeKind::Plain => "email.txt",
            MimeKind::Html => "email.html",
        }
    }
}

/// A decoded text body
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BodyPart {
    /// Plain or html
    pub kind: MimeKind,
    /// Charset-decoded text
    pub text: String,
}

/// A decoded attachment
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    /// Sanitized filename
    pub filename: String,
    /// Transfer-decoded payload
    pub data: Vec<u8>,
}

/// A fetched message broken into the parts written to disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Remote id of the message
    pub message_id: MessageId,
    /// Unique, filesystem-safe folder name
    pub folder_name: String,
    /// `From` header or `unknown_sender`
    pub sender: String,
    /// `Subject` header or `no_subject`
    pub subject: String,
    /// Raw `Date` header, empty when absent
    pub raw_date: String,
    /// Text bodies in document order
    pub body_parts: Vec<BodyPart>,
    /// Attachments in document order
    pub attachments: Vec<Attachment>,
    /// Every header in original order, duplicates preserved
    pub headers: Vec<(String, String)>,
}

/// Why a partition was not processed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Key already present in the progress ledger
    InLedger,
    /// Compressed archive already on disk
    ArchiveExists,
}

/// Counters produced while processing one partition
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PartitionStats {
    /// Ids returned by enumeration
    pub enumerated: u64,
    /// Messages written to disk
    pub archived: u64,
    /// Messages that failed to fetch or decode
    pub fetch_failures: u64,
    /// Messages that failed to write
    pub write_failures: u64,
    /// Attachment files written
    pub attachments_saved: u64,
    /// Bytes of the uncompressed partition folder
    pub original_bytes: u64,
    /// Bytes of the zip archive
    pub compressed_bytes: u64,
    /// Whether a zip archive was produced
    pub archive_created: bool,
    /// Messages removed from the remote mailbox
    pub deleted: u64,
}

/// Totals for a whole run, accumulated by the orchestrator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Ids returned by enumeration across partitions
    pub total_emails: u64,
    /// Messages written to disk
    pub emails_archived: u64,
    /// Messages that failed to fetch or decode
    pub fetch_failures: u64,
    /// Messages that failed to write
    pub write_failures: u64,
    /// Attachment files written
    pub attachments_saved: u64,
    /// Bytes before compression
    pub original_bytes: u64,
    /// Bytes after compression
    pub compressed_bytes: u64,
    /// Zip archives produced
    pub archives_created: u64,
    /// Messages removed from the remote mailbox
    pub emails_deleted: u64,
    /// Partitions finished and recorded in the ledger
    pub partitions_completed: u64,
    /// Partitions skipped as already archived
    pub partitions_skipped: u64,
    /// Partitions aborted by an error
    pub partitions_failed: u64,
}

impl RunStats {
    /// Fold a completed partition into the totals
    pub fn record_partition(&mut self, stats: &PartitionStats) {
        self.total_emails += stats.enumerated;
        self.emails_archived += stats.archived;
        self.fetch_failures += stats.fetch_failures;
        self.write_failures += stats.write_failures;
        self.attachments_saved += stats.attachments_saved;
        self.original_bytes += stats.original_bytes;
        self.compressed_bytes += stats.compressed_bytes;
        if stats.archive_created {
            self.archives_created += 1;
        }
        self.emails_deleted += stats.deleted;
        self.partitions_completed += 1;
    }

    /// Disk space reclaimed by compression
    pub fn space_saved(&self) -> u64 {
        self.original_bytes.saturating_sub(self.compressed_bytes)
    }
}

/// Progress events emitted during a run
///
/// Subscribe with [`Archiver::subscribe`](crate::Archiver::subscribe).
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Partition processing began
    PartitionStarted {
        /// Partition key
        key: String,
    },
    /// Partition skipped without any remote calls
    PartitionSkipped {
        /// Partition key
        key: String,
        /// Why it was skipped
        reason: SkipReason,
    },
    /// Enumeration finished
    IdsEnumerated {
        /// Partition key
        key: String,
        /// Number of ids found
        count: usize,
    },
    /// A buffer of decoded messages was written to disk
    BatchFlushed {
        /// Partition key
        key: String,
        /// Messages written in this flush
        written: usize,
        /// Messages that failed to write in this flush
        failed: usize,
    },
    /// Partition folder compressed
    PartitionCompressed {
        /// Partition key
        key: String,
        /// Uncompressed size in bytes
        original_bytes: u64,
        /// Archive size in bytes
        compressed_bytes: u64,
    },
    /// Partition recorded in the ledger
    PartitionCompleted {
        /// Partition key
        key: String,
        /// Messages archived
        archived: u64,
    },
    /// Partition aborted; it will be retried on the next run
    PartitionFailed {
        /// Partition key
        key: String,
        /// Error description
        error: String,
    },
    /// Archived messages removed from the remote mailbox
    MessagesDeleted {
        /// Partition key
        key: String,
        /// Number deleted
        count: usize,
    },
}
