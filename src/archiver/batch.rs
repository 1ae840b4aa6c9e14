//! Bounded-concurrency fetch+decode with buffered writes

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::decode::decode_message;
use crate::error::{Error, ErrorScope, Result};
use crate::fetch::fetch_message;
use crate::types::{DecodedMessage, Event, MessageId};
use crate::writer::{WriteReport, write_batch};

use super::Archiver;

/// Outcome of archiving one partition's ids
#[derive(Debug, Default)]
pub(crate) struct BatchReport {
    /// Accumulated writer output across flushes
    pub write: WriteReport,
    /// Messages that failed to fetch or decode
    pub fetch_failures: u64,
}

impl Archiver {
    /// Fetch, decode and write `ids` into `folder`
    ///
    /// Up to `concurrency` messages are in flight; results are handled in
    /// completion order and flushed every `flush_threshold` messages and once
    /// more at the end. Each fetch asks the credential provider for a handle.
    /// Cancellation drops in-flight work and returns [`Error::Cancelled`]; a
    /// run-scoped failure such as a rejected token aborts the partition the
    /// same way.
    pub(crate) async fn archive_ids(
        &self,
        key: &str,
        ids: Vec<MessageId>,
        folder: &Path,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        if ids.is_empty() {
            return Ok(report);
        }

        let concurrency = self.config.archive.concurrency;
        let flush_threshold = self.config.archive.flush_threshold;

        let mut results = stream::iter(ids)
            .map(|id| {
                let service = Arc::clone(&self.service);
                let credentials = Arc::clone(&self.credentials);
                let retry = self.config.retry.clone();

                async move {
                    let handle = credentials.get_handle().await?;
                    let raw = fetch_message(service.as_ref(), &id, &handle, &retry).await?;
                    let decode_id = id.clone();
                    tokio::task::spawn_blocking(move || decode_message(&raw, &decode_id))
                        .await
                        .unwrap_or_else(|e| {
                            Err(Error::Decode {
                                id,
                                reason: format!("decode task panicked: {e}"),
                            })
                        })
                }
            })
            .buffer_unordered(concurrency);

        let mut buffer: Vec<DecodedMessage> = Vec::with_capacity(flush_threshold);
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => {
                    tracing::warn!(partition = %key, buffered = buffer.len(), "cancelled, discarding in-flight messages");
                    return Err(Error::Cancelled);
                }
                next = results.next() => next,
            };
            let Some(result) = next else {
                break;
            };

            match result {
                Ok(message) => {
                    buffer.push(message);
                    if buffer.len() >= flush_threshold {
                        self.flush(key, folder, &mut buffer, &mut report.write)
                            .await?;
                    }
                }
                Err(e) if e.scope() == ErrorScope::Run => {
                    tracing::error!(partition = %key, error = %e, "aborting partition");
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(partition = %key, error = %e, "skipping message");
                    report.fetch_failures += 1;
                }
            }
        }

        self.flush(key, folder, &mut buffer, &mut report.write)
            .await?;
        Ok(report)
    }

    /// Write and clear the buffer
    async fn flush(
        &self,
        key: &str,
        folder: &Path,
        buffer: &mut Vec<DecodedMessage>,
        total: &mut WriteReport,
    ) -> Result<()> {
        if buffer.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(buffer);
        let root = folder.to_path_buf();
        let report = tokio::task::spawn_blocking(move || write_batch(&batch, &root))
            .await
            .map_err(|e| Error::Other(format!("write task panicked: {e}")))?;

        tracing::debug!(
            partition = %key,
            written = report.written.len(),
            failed = report.failures.len(),
            "flushed message buffer"
        );
        self.emit_event(Event::BatchFlushed {
            key: key.to_string(),
            written: report.written.len(),
            failed: report.failures.len(),
        });
        total.merge(report);
        Ok(())
    }
}
