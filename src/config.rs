//! Configuration types for mail-archiver

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

/// Archival behavior configuration (directories, concurrency, buffering, deletion)
///
/// Groups settings related to where messages land and how a partition is processed.
/// Used as a flattened sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Root directory for month folders, archives and the ledger (default: "./archive")
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Maximum in-flight fetch+decode tasks per partition (default: 10)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Decoded messages buffered before a flush to disk (default: 100)
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Ids requested per list page, clamped to the service maximum (default: 500)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Remove archived messages from the remote mailbox after a partition completes
    #[serde(default)]
    pub delete_after_archive: bool,

    /// Skip partitions recorded in the progress ledger and append completed ones
    #[serde(default = "default_true")]
    pub use_ledger: bool,

    /// Ledger file (default: `{archive_dir}/completed_partitions.txt`)
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            archive_dir: default_archive_dir(),
            concurrency: default_concurrency(),
            flush_threshold: default_flush_threshold(),
            page_size: default_page_size(),
            delete_after_archive: false,
            use_ledger: true,
            ledger_path: None,
        }
    }
}

/// Which messages a run selects beyond the date bounds
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Restrict to messages carrying this label
    #[serde(default)]
    pub label: Option<String>,

    /// Extra search terms prepended to the generated query
    #[serde(default)]
    pub query: Option<String>,
}

/// Retry configuration for rate-limited requests
///
/// The delay before retry `n` (starting at 1) is
/// `initial_delay * backoff_multiplier^(n-1)`, capped at `max_delay`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 2 seconds)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: false)
    #[serde(default)]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: false,
        }
    }
}

/// Id enumeration settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Fixed pause before re-requesting a rate-limited page (default: 10 seconds)
    #[serde(default = "default_rate_limit_pause", with = "duration_serde")]
    pub rate_limit_pause: Duration,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            rate_limit_pause: default_rate_limit_pause(),
        }
    }
}

/// Main configuration for mail-archiver
///
/// Archive and filter settings are flattened, so a JSON file reads as a single
/// flat object; retry and enumeration settings are nested.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Archival behavior settings
    #[serde(flatten)]
    pub archive: ArchiveConfig,

    /// Message selection
    #[serde(flatten)]
    pub filter: FilterConfig,

    /// Per-message fetch retry policy (also used for batch deletes)
    #[serde(default)]
    pub retry: RetryConfig,

    /// Id enumeration settings
    #[serde(default)]
    pub enumeration: EnumerationConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would stall or misbehave at runtime
    pub fn validate(&self) -> Result<()> {
        if self.archive.concurrency == 0 {
            return Err(Error::config("concurrency", "must be at least 1"));
        }
        if self.archive.flush_threshold == 0 {
            return Err(Error::config("flush_threshold", "must be at least 1"));
        }
        if self.archive.page_size == 0 {
            return Err(Error::config("page_size", "must be at least 1"));
        }
        if self.archive.archive_dir.as_os_str().is_empty() {
            return Err(Error::config("archive_dir", "must not be empty"));
        }
        let multiplier = self.retry.backoff_multiplier;
        if !(1.0..=MAX_BACKOFF_MULTIPLIER).contains(&multiplier) {
            return Err(Error::config(
                "retry.backoff_multiplier",
                format!("must be between 1.0 and {MAX_BACKOFF_MULTIPLIER}, got {multiplier}"),
            ));
        }
        if self.retry.max_delay > MAX_DELAY {
            return Err(Error::config(
                "retry.max_delay",
                format!("must not exceed {}s", MAX_DELAY.as_secs()),
            ));
        }
        if self.enumeration.rate_limit_pause > MAX_DELAY {
            return Err(Error::config(
                "enumeration.rate_limit_pause",
                format!("must not exceed {}s", MAX_DELAY.as_secs()),
            ));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::config(
                "retry.initial_delay",
                "must not exceed retry.max_delay",
            ));
        }
        Ok(())
    }

    /// Root directory for month folders and archives
    pub fn archive_dir(&self) -> &Path {
        &self.archive.archive_dir
    }

    /// Resolved ledger location
    pub fn ledger_path(&self) -> PathBuf {
        self.archive
            .ledger_path
            .clone()
            .unwrap_or_else(|| self.archive.archive_dir.join(DEFAULT_LEDGER_FILE))
    }
}

/// Ledger file name used when no explicit path is configured
pub const DEFAULT_LEDGER_FILE: &str = "completed_partitions.txt";

/// Largest accepted `retry.backoff_multiplier`
pub const MAX_BACKOFF_MULTIPLIER: f64 = 10.0;

/// Longest accepted retry delay or rate-limit pause (one day)
pub const MAX_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

fn default_archive_dir() -> PathBuf {
    PathBuf::from("./archive")
}

fn default_concurrency() -> usize {
    10
}

fn default_flush_threshold() -> usize {
    100
}

fn default_page_size() -> u32 {
    500
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_rate_limit_pause() -> Duration {
    Duration::from_secs(10)
}

/// Delays in config files are seconds, fractions allowed (`0.5` is 500ms)
mod duration_serde {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|e| D::Error::custom(format!("invalid delay {secs}s: {e}")))
    }
}
