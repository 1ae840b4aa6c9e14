//! Remote mailbox seams
//!
//! The archiver talks to the remote store only through [`MailboxService`] and
//! obtains credentials only through [`CredentialProvider`]. [`GmailService`] and
//! [`TokenFileCredentials`] are the REST-backed implementations; tests plug in
//! in-memory ones.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::FilterConfig;
use crate::error::{Result, ServiceError};
use crate::types::{MessageId, Partition};

mod credentials;
mod gmail;

pub use credentials::{StaticCredentials, StoredToken, TokenFileCredentials};
pub use gmail::GmailService;

/// Largest page the list call may request
pub const MAX_PAGE_SIZE: u32 = 500;

/// Largest id set a single batch delete may carry
pub const MAX_BATCH_DELETE: usize = 1000;

/// Bearer credential passed to every service call
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHandle {
    access_token: String,
}

impl AuthHandle {
    /// Wrap an access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
        }
    }

    /// The raw access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl std::fmt::Debug for AuthHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHandle")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// One page of message ids
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Ids on this page
    pub ids: Vec<MessageId>,
    /// Token for the next page, absent on the last one
    pub next_page_token: Option<String>,
}

/// Search filter for one partition
///
/// Renders to the mailbox query syntax, e.g.
/// `from:shop after:2024/03/01 before:2024/04/01 label:receipts -in:spam -in:trash`.
/// Spam and trash are always excluded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailFilter {
    /// First day included
    pub after: NaiveDate,
    /// First day excluded
    pub before: NaiveDate,
    /// Optional label restriction
    pub label: Option<String>,
    /// Optional free-text search terms
    pub terms: Option<String>,
}

impl MailFilter {
    /// Filter covering a partition's effective bounds
    pub fn for_partition(partition: &Partition, filter: &FilterConfig) -> Self {
        Self {
            after: partition.effective_start,
            before: partition.effective_end,
            label: filter.label.clone(),
            terms: filter.query.clone(),
        }
    }
}

impl std::fmt::Display for MailFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(terms) = self.terms.as_deref().map(str::trim)
            && !terms.is_empty()
        {
            write!(f, "{terms} ")?;
        }
        write!(
            f,
            "after:{} before:{}",
            self.after.format("%Y/%m/%d"),
            self.before.format("%Y/%m/%d")
        )?;
        if let Some(label) = self.label.as_deref().map(str::trim)
            && !label.is_empty()
        {
            write!(f, " label:{label}")?;
        }
        f.write_str(" -in:spam -in:trash")
    }
}

/// Source of credentials for the mailbox service
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Obtain a valid handle, refreshing cached credentials if needed
    ///
    /// Fails with [`Error::Auth`](crate::Error::Auth) when no usable credential exists.
    async fn get_handle(&self) -> Result<AuthHandle>;
}

/// Remote mailbox operations used by the archiver
///
/// Every call may fail with [`ServiceError::RateLimited`]; callers decide how
/// to back off.
#[async_trait]
pub trait MailboxService: Send + Sync {
    /// List one page of ids matching `filter`
    async fn list(
        &self,
        filter: &MailFilter,
        page_token: Option<&str>,
        page_size: u32,
        handle: &AuthHandle,
    ) -> std::result::Result<ListPage, ServiceError>;

    /// Fetch the raw RFC 5322 bytes of a message
    async fn get(
        &self,
        id: &MessageId,
        handle: &AuthHandle,
    ) -> std::result::Result<Vec<u8>, ServiceError>;

    /// Permanently delete up to [`MAX_BATCH_DELETE`] messages
    async fn batch_delete(
        &self,
        ids: &[MessageId],
        handle: &AuthHandle,
    ) -> std::result::Result<(), ServiceError>;
}
