//! Shared test helpers: an in-memory mailbox and raw message builders.

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::archiver::Archiver;
use crate::config::Config;
use crate::error::ServiceError;
use crate::service::{AuthHandle, ListPage, MailFilter, MailboxService, StaticCredentials};
use crate::types::MessageId;

/// Build a small RFC 5322 message
pub(crate) fn raw_email(from: &str, subject: &str, date: &str, body: &str) -> Vec<u8> {
    format!("From: {from}\r\nSubject: {subject}\r\nDate: {date}\r\n\r\n{body}\r\n").into_bytes()
}

/// In-memory mailbox keyed by message date
///
/// `list` returns the ids whose date falls inside the filter bounds, paged by
/// offset tokens. Failures can be scripted per id.
#[derive(Default)]
pub(crate) struct MemoryMailbox {
    messages: Mutex<BTreeMap<String, (NaiveDate, Vec<u8>)>>,
    get_failures: Mutex<HashMap<String, Vec<ServiceError>>>,
    pub list_calls: Mutex<Vec<MailFilter>>,
    pub get_calls: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<Vec<String>>>,
}

impl MemoryMailbox {
    pub(crate) fn insert(&self, id: &str, date: NaiveDate, raw: Vec<u8>) {
        self.messages
            .lock()
            .unwrap()
            .insert(id.to_string(), (date, raw));
    }

    /// Queue errors returned by `get(id)` before it succeeds
    pub(crate) fn fail_get(&self, id: &str, errors: Vec<ServiceError>) {
        self.get_failures
            .lock()
            .unwrap()
            .insert(id.to_string(), errors);
    }

    pub(crate) fn list_count(&self) -> usize {
        self.list_calls.lock().unwrap().len()
    }

    pub(crate) fn get_count(&self) -> usize {
        self.get_calls.lock().unwrap().len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MailboxService for MemoryMailbox {
    async fn list(
        &self,
        filter: &MailFilter,
        page_token: Option<&str>,
        page_size: u32,
        _handle: &AuthHandle,
    ) -> Result<ListPage, ServiceError> {
        self.list_calls.lock().unwrap().push(filter.clone());

        let matching: Vec<String> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (date, _))| filter.after <= *date && *date < filter.before)
            .map(|(id, _)| id.clone())
            .collect();

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + page_size as usize).min(matching.len());
        let ids = matching[offset.min(end)..end]
            .iter()
            .map(|id| MessageId::from(id.as_str()))
            .collect();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        Ok(ListPage {
            ids,
            next_page_token,
        })
    }

    async fn get(&self, id: &MessageId, _handle: &AuthHandle) -> Result<Vec<u8>, ServiceError> {
        self.get_calls.lock().unwrap().push(id.to_string());

        if let Some(errors) = self.get_failures.lock().unwrap().get_mut(id.as_str())
            && !errors.is_empty()
        {
            return Err(errors.remove(0));
        }

        self.messages
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|(_, raw)| raw.clone())
            .ok_or(ServiceError::Rejected {
                status: 404,
                message: "Not Found".into(),
            })
    }

    async fn batch_delete(&self, ids: &[MessageId], _handle: &AuthHandle) -> Result<(), ServiceError> {
        let mut messages = self.messages.lock().unwrap();
        for id in ids {
            messages.remove(id.as_str());
        }
        self.deleted
            .lock()
            .unwrap()
            .push(ids.iter().map(|id| id.to_string()).collect());
        Ok(())
    }
}

/// Config rooted in `root` with fast retries
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.archive.archive_dir = root.to_path_buf();
    config.archive.concurrency = 4;
    config.retry.initial_delay = std::time::Duration::from_millis(1);
    config.retry.max_delay = std::time::Duration::from_millis(10);
    config.enumeration.rate_limit_pause = std::time::Duration::from_millis(1);
    config
}

/// Archiver over `mailbox` with a static token
pub(crate) fn test_archiver(config: Config, mailbox: Arc<MemoryMailbox>) -> Archiver {
    Archiver::new(config, mailbox, Arc::new(StaticCredentials::new("test-token"))).unwrap()
}
