//! Archive orchestration (decomposed into focused submodules)
//!
//! [`Archiver::run`] walks the planned partitions in order. Each partition is
//! enumerated, fetched and decoded concurrently, written to disk in buffered
//! batches, compressed, recorded in the progress ledger and optionally deleted
//! from the remote mailbox.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, ErrorScope, Result};
use crate::ledger::ProgressLedger;
use crate::planner::plan_partitions;
use crate::service::{CredentialProvider, MailboxService};
use crate::types::{DateRange, Event, RunStats};

mod batch;
mod partition;


pub use partition::PartitionOutcome;

/// Resumable, month-partitioned mailbox archiver
pub struct Archiver {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Remote mailbox
    pub(crate) service: Arc<dyn MailboxService>,
    /// Credential source, asked once per run
    pub(crate) credentials: Arc<dyn CredentialProvider>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancels the current run
    pub(crate) cancel_token: CancellationToken,
}

impl Archiver {
    /// Create an archiver after validating `config`
    pub fn new(
        config: Config,
        service: Arc<dyn MailboxService>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(1000);
        Ok(Self {
            config: Arc::new(config),
            service,
            credentials,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribe to progress events
    ///
    /// Multiple subscribers are supported. A subscriber that falls more than
    /// 1000 events behind receives `RecvError::Lagged`.
    ///
    /// ```no_run
    /// # use mail_archiver::{Archiver, Config, DateRange, GmailService, TokenFileCredentials};
    /// # use std::sync::Arc;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let archiver = Archiver::new(
    ///     Config::default(),
    ///     Arc::new(GmailService::new()?),
    ///     Arc::new(TokenFileCredentials::new("token.json")?),
    /// )?;
    ///
    /// let mut events = archiver.subscribe();
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         tracing::info!(?event, "archive event");
    ///     }
    /// });
    ///
    /// let stats = archiver.run(&DateRange::parse("01-01-2024", "03-31-2024")?).await?;
    /// println!("archived {} messages", stats.emails_archived);
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Token that aborts the run when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Abort the run; the partition in progress is not recorded as complete
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() returns Err if there are no receivers, which is fine - we just drop the event
        self.event_tx.send(event).ok();
    }

    /// Archive every month of `range`
    ///
    /// Partitions run sequentially. A partition that fails (enumeration,
    /// compaction or ledger) is logged, counted and left for the next run;
    /// the run moves on. Credential, configuration and cancellation errors
    /// end the run.
    pub async fn run(&self, range: &DateRange) -> Result<RunStats> {
        // fail before touching disk when no credential is available
        self.credentials.get_handle().await?;

        let ledger = if self.config.archive.use_ledger {
            Some(ProgressLedger::load(self.config.ledger_path()).await?)
        } else {
            None
        };

        let root = self.config.archive_dir();
        tokio::fs::create_dir_all(root).await?;

        let partitions = plan_partitions(range);
        tracing::info!(
            start = %range.start(),
            end = %range.end(),
            partitions = partitions.len(),
            archive_dir = %root.display(),
            "starting archive run"
        );

        let mut stats = RunStats::default();
        for partition in &partitions {
            if self.cancel_token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let key = partition.key();
            match self
                .process_partition(partition, ledger.as_ref())
                .await
            {
                Ok(PartitionOutcome::Skipped(_)) => stats.partitions_skipped += 1,
                Ok(PartitionOutcome::Completed(partition_stats)) => {
                    stats.record_partition(&partition_stats);
                }
                Err(e) if e.scope() == ErrorScope::Run => {
                    tracing::warn!(partition = %key, error = %e, "archive run stopped");
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(partition = %key, error = %e, "partition failed, will retry on next run");
                    self.emit_event(Event::PartitionFailed {
                        key,
                        error: e.to_string(),
                    });
                    stats.partitions_failed += 1;
                }
            }
        }

        tracing::info!(
            archived = stats.emails_archived,
            completed = stats.partitions_completed,
            skipped = stats.partitions_skipped,
            failed = stats.partitions_failed,
            space_saved = stats.space_saved(),
            "archive run finished"
        );
        Ok(stats)
    }
}
