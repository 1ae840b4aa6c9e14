//! Single-message fetch with rate-limit backoff

use crate::config::RetryConfig;
use crate::error::FetchError;
use crate::retry::retry_with_backoff;
use crate::service::{AuthHandle, MailboxService};
use crate::types::MessageId;

/// Fetch the raw bytes of one message
///
/// Rate-limit responses are retried with exponential backoff per `retry`.
/// When the budget runs out the result is [`FetchError::RetriesExhausted`];
/// any other service error fails immediately as [`FetchError::Service`].
pub async fn fetch_message(
    service: &dyn MailboxService,
    id: &MessageId,
    handle: &AuthHandle,
    retry: &RetryConfig,
) -> Result<Vec<u8>, FetchError> {
    let outcome = retry_with_backoff(retry, || service.get(id, handle)).await;
    let exhausted = outcome.exhausted();

    match outcome.result {
        Ok(raw) => Ok(raw),
        Err(_) if exhausted => Err(FetchError::RetriesExhausted {
            id: id.clone(),
            attempts: outcome.retries,
        }),
        Err(source) => Err(FetchError::Service {
            id: id.clone(),
            source,
        }),
    }
}
