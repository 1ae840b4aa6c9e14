//! Scriptable in-memory [`MailboxService`] for integration tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use mail_archiver::{AuthHandle, ListPage, MailFilter, MailboxService, MessageId, ServiceError};

/// Mailbox holding raw messages keyed by id, each tagged with its date
///
/// `list` honours the filter's `after`/`before` bounds and pages with
/// numeric offset tokens. Errors can be queued per id for `get` and globally
/// for `list`.
#[derive(Default)]
pub struct MockMailbox {
    messages: Mutex<BTreeMap<String, (NaiveDate, Vec<u8>)>>,
    list_failures: Mutex<VecDeque<ServiceError>>,
    get_failures: Mutex<HashMap<String, VecDeque<ServiceError>>>,
    list_calls: Mutex<Vec<String>>,
    get_calls: Mutex<Vec<String>>,
    delete_calls: Mutex<Vec<usize>>,
}

impl MockMailbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: &str, date: NaiveDate, raw: Vec<u8>) {
        self.messages
            .lock()
            .unwrap()
            .insert(id.to_string(), (date, raw));
    }

    /// Make the next `list` calls fail with `errors`, in order
    pub fn fail_list(&self, errors: impl IntoIterator<Item = ServiceError>) {
        self.list_failures.lock().unwrap().extend(errors);
    }

    /// Make the next `get(id)` calls fail with `errors`, in order
    pub fn fail_get(&self, id: &str, errors: impl IntoIterator<Item = ServiceError>) {
        self.get_failures
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .extend(errors);
    }

    /// Query strings seen by `list`
    pub fn list_queries(&self) -> Vec<String> {
        self.list_calls.lock().unwrap().clone()
    }

    pub fn get_count(&self) -> usize {
        self.get_calls.lock().unwrap().len()
    }

    pub fn get_count_for(&self, id: &str) -> usize {
        self.get_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|seen| seen.as_str() == id)
            .count()
    }

    /// Sizes of each `batch_delete` call
    pub fn delete_batches(&self) -> Vec<usize> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MailboxService for MockMailbox {
    async fn list(
        &self,
        filter: &MailFilter,
        page_token: Option<&str>,
        page_size: u32,
        _handle: &AuthHandle,
    ) -> Result<ListPage, ServiceError> {
        self.list_calls.lock().unwrap().push(filter.to_string());
        if let Some(error) = self.list_failures.lock().unwrap().pop_front() {
            return Err(error);
        }

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
            .map(|id| MessageId::new(id.as_str()))
            .collect();

        Ok(ListPage {
            ids,
            next_page_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn get(&self, id: &MessageId, _handle: &AuthHandle) -> Result<Vec<u8>, ServiceError> {
        self.get_calls.lock().unwrap().push(id.to_string());
        if let Some(queue) = self.get_failures.lock().unwrap().get_mut(id.as_str())
            && let Some(error) = queue.pop_front()
        {
            return Err(error);
        }

        self.messages
            .lock()
            .unwrap()
            .get(id.as_str())
            .map(|(_, raw)| raw.clone())
            .ok_or(ServiceError::Rejected {
                status: 404,
                message: "Requested entity was not found.".into(),
            })
    }

    async fn batch_delete(&self, ids: &[MessageId], _handle: &AuthHandle) -> Result<(), ServiceError> {
        self.delete_calls.lock().unwrap().push(ids.len());
        let mut messages = self.messages.lock().unwrap();
        for id in ids {
            messages.remove(id.as_str());
        }
        Ok(())
    }
}
