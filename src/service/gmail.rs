//! Gmail REST implementation of [`MailboxService`]

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{AuthHandle, ListPage, MAX_BATCH_DELETE, MAX_PAGE_SIZE, MailFilter, MailboxService};
use crate::error::{Error, Result, ServiceError};
use crate::types::MessageId;

/// Production API root
pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/";

/// Error reasons Gmail attaches to 403 responses when throttling
const RATE_LIMIT_REASONS: [&str; 2] = ["rateLimitExceeded", "userRateLimitExceeded"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct RawMessage {
    raw: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Mailbox service backed by the Gmail v1 REST API
pub struct GmailService {
    http_client: reqwest::Client,
    messages_url: Url,
}

impl GmailService {
    /// Create a service talking to the production API
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new() -> Result<Self> {
        Self::with_base_url(GMAIL_API_BASE)
    }

    /// Create a service rooted at `base_url` (used against mock servers)
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::config("gmail_base_url", format!("invalid URL: {e}")))?;
        let messages_url = base
            .join("gmail/v1/users/me/messages")
            .map_err(|e| Error::config("gmail_base_url", format!("invalid URL: {e}")))?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("mail-archiver/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            messages_url,
        })
    }

    fn message_url(&self, suffix: &str) -> String {
        format!("{}/{}", self.messages_url, suffix)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::Response, ServiceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status.as_u16(), &body))
    }
}

/// Map a non-success response to a [`ServiceError`]
fn classify_failure(status: u16, body: &str) -> ServiceError {
    let envelope = serde_json::from_str::<ErrorEnvelope>(body).ok();

    let throttled = status == 429
        || (status == 403
            && envelope.as_ref().is_some_and(|env| {
                env.error
                    .errors
                    .iter()
                    .any(|d| RATE_LIMIT_REASONS.contains(&d.reason.as_str()))
            }));
    if throttled {
        return ServiceError::RateLimited;
    }

    let message = match envelope {
        Some(env) if !env.error.message.is_empty() => env.error.message,
        _ => body.chars().take(200).collect(),
    };
    if status == 401 {
        return ServiceError::Unauthorized(message);
    }
    ServiceError::Rejected { status, message }
}

#[async_trait]
impl MailboxService for GmailService {
    async fn list(
        &self,
        filter: &MailFilter,
        page_token: Option<&str>,
        page_size: u32,
        handle: &AuthHandle,
    ) -> std::result::Result<ListPage, ServiceError> {
        let mut url = self.messages_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &filter.to_string())
                .append_pair("maxResults", &page_size.clamp(1, MAX_PAGE_SIZE).to_string());
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }

        let response = self
            .send(self.http_client.get(url).bearer_auth(handle.access_token()))
            .await?;
        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        Ok(ListPage {
            ids: body
                .messages
                .into_iter()
                .map(|m| MessageId::new(m.id))
                .collect(),
            next_page_token: body.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn get(
        &self,
        id: &MessageId,
        handle: &AuthHandle,
    ) -> std::result::Result<Vec<u8>, ServiceError> {
        let url = self.message_url(&urlencoding::encode(id.as_str()));
        let response = self
            .send(
                self.http_client
                    .get(url)
                    .query(&[("format", "raw")])
                    .bearer_auth(handle.access_token()),
            )
            .await?;
        let body: RawMessage = response
            .json()
            .await
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;

        URL_SAFE_NO_PAD
            .decode(body.raw.trim_end_matches('='))
            .map_err(|e| ServiceError::InvalidResponse(format!("raw payload is not base64url: {e}")))
    }

    async fn batch_delete(
        &self,
        ids: &[MessageId],
        handle: &AuthHandle,
    ) -> std::result::Result<(), ServiceError> {
        if ids.is_empty() {
            return Ok(());
        }
        if ids.len() > MAX_BATCH_DELETE {
            return Err(ServiceError::Rejected {
                status: 400,
                message: format!(
                    "batch of {} ids exceeds the limit of {MAX_BATCH_DELETE}",
                    ids.len()
                ),
            });
        }

        let payload = serde_json::json!({ "ids": ids });
        self.send(
            self.http_client
                .post(self.message_url("batchDelete"))
                .bearer_auth(handle.access_token())
                .json(&payload),
        )
        .await?;
        Ok(())
    }
}
