//! Remote deletion of archived messages

use crate::config::RetryConfig;
use crate::error::ServiceError;
use crate::retry::retry_with_backoff;
use crate::service::{AuthHandle, MAX_BATCH_DELETE, MailboxService};
use crate::types::MessageId;

/// Outcome of a deletion pass
#[derive(Debug, Default)]
pub struct DeletionReport {
    /// Messages the service confirmed deleted
    pub deleted: usize,
    /// Chunks that failed, with the ids they carried
    pub failed_chunks: Vec<(Vec<MessageId>, ServiceError)>,
}

impl DeletionReport {
    /// Number of ids left undeleted
    pub fn failed(&self) -> usize {
        self.failed_chunks.iter().map(|(ids, _)| ids.len()).sum()
    }
}

/// Delete `ids` in chunks of at most [`MAX_BATCH_DELETE`]
///
/// Rate-limited chunks are retried per `retry`. A chunk that still fails is
/// recorded and the remaining chunks are attempted.
pub async fn delete_messages(
    service: &dyn MailboxService,
    ids: &[MessageId],
    handle: &AuthHandle,
    retry: &RetryConfig,
) -> DeletionReport {
    let mut report = DeletionReport::default();

    for chunk in ids.chunks(MAX_BATCH_DELETE) {
        let outcome = retry_with_backoff(retry, || service.batch_delete(chunk, handle)).await;
        match outcome.result {
            Ok(()) => {
                report.deleted += chunk.len();
                tracing::debug!(count = chunk.len(), "deleted message chunk");
            }
            Err(e) => {
                tracing::error!(count = chunk.len(), error = %e, "failed to delete message chunk");
                report.failed_chunks.push((chunk.to_vec(), e));
            }
        }
    }

    report
}
