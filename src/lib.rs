//! # mail-archiver
//!
//! Resumable, month-partitioned archiver for a remote mailbox.
//!
//! ## Design Philosophy
//!
//! mail-archiver is designed to be:
//! - **Resumable** - Completed months are recorded in a durable ledger and skipped on restart
//! - **Concurrent** - Messages are fetched and decoded on a bounded stream, written in batches
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use mail_archiver::{Archiver, Config, DateRange, GmailService, TokenFileCredentials};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.archive.delete_after_archive = false;
//!
//!     let archiver = Archiver::new(
//!         config,
//!         Arc::new(GmailService::new()?),
//!         Arc::new(TokenFileCredentials::new("token.json")?),
//!     )?;
//!
//!     // Subscribe to events
//!     let mut events = archiver.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let range = DateRange::parse("01-01-2023", "12-31-2023")?;
//!     let stats = archiver.run(&range).await?;
//!     println!("archived {} of {} messages", stats.emails_archived, stats.total_emails);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Archive orchestration
pub mod archiver;
/// Partition compaction into zip archives
pub mod compact;
/// Configuration types
pub mod config;
/// Raw message decoding
pub mod decode;
/// Remote deletion of archived messages
pub mod deletion;
/// Paginated id enumeration
pub mod enumerate;
/// Error types
pub mod error;
/// Single-message fetch with backoff
pub mod fetch;
/// Durable progress ledger
pub mod ledger;
/// Month partition planning
pub mod planner;
/// Retry logic with exponential backoff
pub mod retry;
/// Remote mailbox and credential seams
pub mod service;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Disk writer for decoded messages
pub mod writer;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use archiver::{Archiver, PartitionOutcome};
pub use config::Config;
pub use error::{Error, ErrorScope, FetchError, Result, ServiceError};
pub use service::{
    AuthHandle, CredentialProvider, GmailService, ListPage, MailFilter, MailboxService,
    StaticCredentials, TokenFileCredentials,
};
pub use types::{
    DateRange, DecodedMessage, Event, MessageId, Partition, PartitionStats, RunStats, SkipReason,
};

/// Helper function to run an archive with graceful signal handling.
///
/// Races the run against a termination signal; on signal the archiver's
/// cancellation token is triggered and the run returns [`Error::Cancelled`].
/// The partition in progress is not recorded and is redone on the next run.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use mail_archiver::{Archiver, Config, DateRange, GmailService, TokenFileCredentials, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let archiver = Archiver::new(
///         Config::default(),
///         Arc::new(GmailService::new()?),
///         Arc::new(TokenFileCredentials::new("token.json")?),
///     )?;
///
///     // Run with automatic signal handling
///     let range = DateRange::parse("01-01-2024", "06-30-2024")?;
///     run_with_shutdown(&archiver, &range).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(archiver: &Archiver, range: &DateRange) -> Result<RunStats> {
    let cancel = archiver.cancellation_token();
    let run = archiver.run(range);
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => result,
        signal = wait_for_signal() => {
            tracing::warn!(
                signal,
                "stopping archive run; the month in progress is not recorded and will be redone"
            );
            cancel.cancel();
            run.await
        }
    }
}

/// Resolve with the name of the first termination signal received
#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let terminate = signal(SignalKind::terminate())
        .inspect_err(|e| tracing::warn!(error = %e, "SIGTERM handler unavailable"))
        .ok();
    let interrupt = signal(SignalKind::interrupt())
        .inspect_err(|e| tracing::warn!(error = %e, "SIGINT handler unavailable"))
        .ok();

    match (terminate, interrupt) {
        (Some(mut term), Some(mut int)) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        (Some(mut term), None) => {
            term.recv().await;
            "SIGTERM"
        }
        (None, Some(mut int)) => {
            int.recv().await;
            "SIGINT"
        }
        (None, None) => ctrl_c().await,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C; shutdown must come from the cancellation token");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
