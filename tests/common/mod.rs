//! Common test utilities for mail-archiver integration tests

#[allow(dead_code)]
pub mod fixtures;
#[allow(dead_code)]
pub mod mock_mailbox;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_mailbox::*;

use mail_archiver::{Archiver, Config, StaticCredentials};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Config rooted in `root` with millisecond-scale retries
#[allow(dead_code)]
pub fn fast_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.archive.archive_dir = root.to_path_buf();
    config.archive.concurrency = 4;
    config.retry.initial_delay = Duration::from_millis(1);
    config.retry.max_delay = Duration::from_millis(20);
    config.enumeration.rate_limit_pause = Duration::from_millis(1);
    config
}

/// Archiver over `mailbox` with a fixed access token
#[allow(dead_code)]
pub fn archiver_for(config: Config, mailbox: Arc<MockMailbox>) -> Archiver {
    Archiver::new(
        config,
        mailbox,
        Arc::new(StaticCredentials::new("integration-token")),
    )
    .expect("valid test config")
}
