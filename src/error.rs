//! Error types for mail-archiver
//!
//! This module provides the error taxonomy for the archival pipeline:
//! - Run-level failures that abort the whole run (auth, invalid range, config)
//! - Partition-level failures that abort one month (enumeration, compaction, ledger)
//! - Message-level failures that are logged and skipped (fetch, decode, write)
//! - Service errors returned by a [`MailboxService`](crate::service::MailboxService)

use crate::types::MessageId;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mail-archiver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for mail-archiver
///
/// Each variant carries the identifier (message id, partition key or path) needed
/// to report it without further context.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "concurrency")
        key: Option<String>,
    },

    /// No valid credential could be obtained
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Date range with start after end
    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        /// Requested start date
        start: NaiveDate,
        /// Requested end date
        end: NaiveDate,
    },

    /// Listing message ids for a partition failed
    #[error("enumeration failed for partition {partition}: {source}")]
    Enumeration {
        /// Partition key (e.g. "2024/03")
        partition: String,
        /// The underlying service failure
        source: ServiceError,
    },

    /// Fetching a single message failed
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// A fetched message could not be decoded
    #[error("failed to decode message {id}: {reason}")]
    Decode {
        /// Message that failed to decode
        id: MessageId,
        /// Why decoding failed
        reason: String,
    },

    /// Writing a decoded message to disk failed
    #[error("failed to write message folder {folder}: {source}")]
    Write {
        /// Folder name of the message being written
        folder: String,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Compressing a partition folder failed
    #[error("compaction failed for {path}: {reason}")]
    Compaction {
        /// Partition folder being compressed
        path: PathBuf,
        /// Why compaction failed
        reason: String,
    },

    /// Reading or appending the progress ledger failed
    #[error("progress ledger error at {path}: {source}")]
    Ledger {
        /// Ledger file path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// Remote mailbox service error outside a fetch or enumeration
    #[error("mailbox service error: {0}")]
    Service(#[from] ServiceError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled before it finished
    #[error("archive run cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors reported by a mailbox service implementation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The service asked the caller to slow down
    #[error("rate limited by mailbox service")]
    RateLimited,

    /// The service rejected the request
    #[error("request rejected with status {status}: {message}")]
    Rejected {
        /// HTTP-like status code returned by the service
        status: u16,
        /// Message returned by the service
        message: String,
    },

    /// The access token was missing, expired or revoked
    #[error("access token rejected: {0}")]
    Unauthorized(String),

    /// The request never reached the service or the connection dropped
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with something we could not interpret
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ServiceError {
    /// Whether this is the rate-limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ServiceError::RateLimited)
    }

    /// Whether the service refused the credential itself
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ServiceError::Unauthorized(_))
    }
}

/// Per-message fetch failures
#[derive(Debug, Error)]
pub enum FetchError {
    /// The service kept rate limiting until the retry budget ran out
    #[error("message {id}: still rate limited after {attempts} retries")]
    RetriesExhausted {
        /// Message being fetched
        id: MessageId,
        /// Number of retries performed
        attempts: u32,
    },

    /// The service failed with a non-retryable error
    #[error("message {id}: {source}")]
    Service {
        /// Message being fetched
        id: MessageId,
        /// The underlying service failure
        source: ServiceError,
    },
}

impl FetchError {
    /// The message this failure belongs to
    pub fn message_id(&self) -> &MessageId {
        match self {
            FetchError::RetriesExhausted { id, .. } | FetchError::Service { id, .. } => id,
        }
    }
}

/// How far a failure propagates through the pipeline
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorScope {
    /// Aborts the whole run
    Run,
    /// Aborts the current partition; it is retried on the next run
    Partition,
    /// Absorbed at the message boundary and logged
    Message,
}

impl Error {
    /// Classify how far this error is allowed to propagate
    ///
    /// A rejected credential is run-scoped wherever it surfaces.
    pub fn scope(&self) -> ErrorScope {
        match self {
            Error::Fetch(FetchError::Service { source, .. })
            | Error::Enumeration { source, .. }
            | Error::Service(source)
                if source.is_unauthorized() =>
            {
                ErrorScope::Run
            }
            Error::Config { .. } | Error::Auth(_) | Error::InvalidRange { .. } | Error::Cancelled => {
                ErrorScope::Run
            }
            Error::Fetch(_) | Error::Decode { .. } | Error::Write { .. } => ErrorScope::Message,
            Error::Enumeration { .. }
            | Error::Compaction { .. }
            | Error::Ledger { .. }
            | Error::Service(_)
            | Error::Io(_)
            | Error::Network(_)
            | Error::Serialization(_)
            | Error::Other(_) => ErrorScope::Partition,
        }
    }

    /// Build a configuration error for a specific key
    pub(crate) fn config(key: &str, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }
}
