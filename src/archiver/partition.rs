//! Per-partition pipeline: skip checks, enumeration, archiving, compaction,
//! ledger append and optional deletion.

use crate::compact::{archive_path_for, compact_folder};
use crate::deletion::delete_messages;
use crate::enumerate::enumerate_ids;
use crate::error::{Error, Result};
use crate::ledger::ProgressLedger;
use crate::service::MailFilter;
use crate::types::{Event, Partition, PartitionStats, SkipReason};

use super::Archiver;

/// What happened to a partition
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// Already archived; no remote calls were made
    Skipped(SkipReason),
    /// Processed and recorded as complete
    Completed(PartitionStats),
}

impl Archiver {
    /// Run the full pipeline for one partition
    ///
    /// Credentials are requested from the provider for each remote step, so a
    /// token that expires mid-run is refreshed rather than reused.
    pub(crate) async fn process_partition(
        &self,
        partition: &Partition,
        ledger: Option<&ProgressLedger>,
    ) -> Result<PartitionOutcome> {
        let key = partition.key();
        let folder = partition.folder(self.config.archive_dir());
        let archive_path = archive_path_for(&folder);

        if let Some(ledger) = ledger
            && ledger.contains(&key).await
        {
            tracing::info!(partition = %key, "already in progress ledger, skipping");
            return Ok(self.skipped(key, SkipReason::InLedger));
        }

        if tokio::fs::try_exists(&archive_path).await.unwrap_or(false) {
            tracing::info!(partition = %key, archive = %archive_path.display(), "archive already exists, skipping");
            if let Some(ledger) = ledger {
                ledger.append(&key).await?;
            }
            return Ok(self.skipped(key, SkipReason::ArchiveExists));
        }

        self.emit_event(Event::PartitionStarted { key: key.clone() });
        let filter = MailFilter::for_partition(partition, &self.config.filter);
        tracing::info!(partition = %key, query = %filter, "enumerating messages");

        let handle = self.credentials.get_handle().await?;
        let enumeration = enumerate_ids(
            self.service.as_ref(),
            &filter,
            self.config.archive.page_size,
            &handle,
            self.config.enumeration.rate_limit_pause,
        );
        let ids = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => return Err(Error::Cancelled),
            ids = enumeration => ids.map_err(|source| Error::Enumeration {
                partition: key.clone(),
                source,
            })?,
        };

        tracing::info!(partition = %key, count = ids.len(), "enumerated messages");
        self.emit_event(Event::IdsEnumerated {
            key: key.clone(),
            count: ids.len(),
        });

        let mut stats = PartitionStats {
            enumerated: ids.len() as u64,
            ..Default::default()
        };

        if ids.is_empty() {
            remove_empty_dir(&folder).await;
        }

        let report = self.archive_ids(&key, ids, &folder).await?;
        stats.archived = report.write.written.len() as u64;
        stats.fetch_failures = report.fetch_failures;
        stats.write_failures = report.write.failures.len() as u64;
        stats.attachments_saved = report.write.attachments_saved;

        let compact_target = folder.clone();
        let compaction = tokio::task::spawn_blocking(move || compact_folder(&compact_target))
            .await
            .map_err(|e| Error::Compaction {
                path: folder.clone(),
                reason: format!("compaction task panicked: {e}"),
            })??;

        if let Some(compaction) = compaction {
            stats.original_bytes = compaction.original_bytes;
            stats.compressed_bytes = compaction.compressed_bytes;
            stats.archive_created = true;
            self.emit_event(Event::PartitionCompressed {
                key: key.clone(),
                original_bytes: compaction.original_bytes,
                compressed_bytes: compaction.compressed_bytes,
            });
        }

        if let Some(ledger) = ledger {
            ledger.append(&key).await?;
        }
        tracing::info!(
            partition = %key,
            archived = stats.archived,
            fetch_failures = stats.fetch_failures,
            write_failures = stats.write_failures,
            "partition complete"
        );
        self.emit_event(Event::PartitionCompleted {
            key: key.clone(),
            archived: stats.archived,
        });

        if self.config.archive.delete_after_archive && !report.write.written.is_empty() {
            let handle = self.credentials.get_handle().await?;
            let deletion = delete_messages(
                self.service.as_ref(),
                &report.write.written,
                &handle,
                &self.config.retry,
            )
            .await;
            if deletion.failed() > 0 {
                tracing::error!(
                    partition = %key,
                    failed = deletion.failed(),
                    "some archived messages could not be deleted"
                );
            }
            stats.deleted = deletion.deleted as u64;
            self.emit_event(Event::MessagesDeleted {
                key,
                count: deletion.deleted,
            });
        }

        Ok(PartitionOutcome::Completed(stats))
    }

    fn skipped(&self, key: String, reason: SkipReason) -> PartitionOutcome {
        self.emit_event(Event::PartitionSkipped { key, reason });
        PartitionOutcome::Skipped(reason)
    }
}

/// Remove a leftover partition directory if it holds nothing
async fn remove_empty_dir(folder: &std::path::Path) {
    match tokio::fs::remove_dir(folder).await {
        Ok(()) => tracing::debug!(folder = %folder.display(), "removed empty partition folder"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::debug!(folder = %folder.display(), error = %e, "partition folder not removed")
        }
    }
}
