//! Durable record of completed partitions
//!
//! One partition key per line. Appends are fsynced before the in-memory set
//! is updated, so a key visible through [`ProgressLedger::contains`] is on disk.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{Error, Result};

/// Append-only set of completed partition keys backed by a file
#[derive(Debug)]
pub struct ProgressLedger {
    path: PathBuf,
    keys: Mutex<HashSet<String>>,
}

impl ProgressLedger {
    /// Load the ledger at `path`, creating the file and its parents if absent
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let ledger_err = |source| Error::Ledger {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(ledger_err)?;
        }

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::File::create(&path).await.map_err(ledger_err)?;
                String::new()
            }
            Err(e) => return Err(ledger_err(e)),
        };

        let keys: HashSet<String> = contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        tracing::debug!(path = %path.display(), completed = keys.len(), "loaded progress ledger");
        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    /// Ledger file location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `key` has been recorded
    pub async fn contains(&self, key: &str) -> bool {
        self.keys.lock().await.contains(key)
    }

    /// Number of recorded keys
    pub async fn len(&self) -> usize {
        self.keys.lock().await.len()
    }

    /// Whether no key has been recorded yet
    pub async fn is_empty(&self) -> bool {
        self.keys.lock().await.is_empty()
    }

    /// Durably record `key`; recording a present key is a no-op
    pub async fn append(&self, key: &str) -> Result<()> {
        let mut keys = self.keys.lock().await;
        if keys.contains(key) {
            return Ok(());
        }

        let ledger_err = |source| Error::Ledger {
            path: self.path.clone(),
            source,
        };
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(ledger_err)?;
        file.write_all(format!("{key}\n").as_bytes())
            .await
            .map_err(ledger_err)?;
        file.sync_all().await.map_err(ledger_err)?;

        keys.insert(key.to_string());
        Ok(())
    }
}
