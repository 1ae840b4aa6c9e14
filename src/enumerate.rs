//! Paginated id enumeration

use std::time::Duration;

use crate::error::ServiceError;
use crate::service::{AuthHandle, MAX_PAGE_SIZE, MailFilter, MailboxService};
use crate::types::MessageId;

/// Collect every message id matching `filter`
///
/// Pages are requested until the service returns no next-page token or an
/// empty page. A rate-limited page is re-requested after `rate_limit_pause`,
/// with no upper bound on the number of pauses. Any other service error ends
/// enumeration.
pub async fn enumerate_ids(
    service: &dyn MailboxService,
    filter: &MailFilter,
    page_size: u32,
    handle: &AuthHandle,
    rate_limit_pause: Duration,
) -> Result<Vec<MessageId>, ServiceError> {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let mut ids = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = match service
            .list(filter, page_token.as_deref(), page_size, handle)
            .await
        {
            Ok(page) => page,
            Err(ServiceError::RateLimited) => {
                tracing::warn!(
                    query = %filter,
                    pause_secs = rate_limit_pause.as_secs_f64(),
                    "rate limited while listing messages, pausing"
                );
                tokio::time::sleep(rate_limit_pause).await;
                continue;
            }
            Err(e) => return Err(e),
        };

        pages += 1;
        let empty = page.ids.is_empty();
        ids.extend(page.ids);

        match page.next_page_token {
            Some(token) if !empty => page_token = Some(token),
            _ => break,
        }
    }

    tracing::debug!(query = %filter, pages, count = ids.len(), "enumeration finished");
    Ok(ids)
}
