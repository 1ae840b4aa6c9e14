//! Credential providers
//!
//! [`TokenFileCredentials`] reads the authorized-user cache written by a prior
//! consent flow and refreshes it through the OAuth token endpoint when it has
//! expired. The refreshed cache is written back so later runs reuse it.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;

use super::{AuthHandle, CredentialProvider};
use crate::error::{Error, Result};

/// Tokens this close to expiry, in seconds, are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Authorized-user token cache (`token.json`)
///
/// Unknown fields are preserved across a refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredToken {
    /// Current access token
    pub token: String,
    /// Long-lived refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// OAuth token endpoint
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    /// OAuth client id
    #[serde(default)]
    pub client_id: Option<String>,
    /// OAuth client secret
    #[serde(default)]
    pub client_secret: Option<String>,
    /// When `token` stops being valid
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl StoredToken {
    /// Whether the access token can be used at `now`
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + TimeDelta::seconds(EXPIRY_MARGIN_SECS) < expiry,
            None => true,
        }
    }
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Credentials loaded from a token cache file, refreshed on demand
pub struct TokenFileCredentials {
    path: PathBuf,
    http_client: reqwest::Client,
    cached: Mutex<Option<StoredToken>>,
}

impl TokenFileCredentials {
    /// Use the token cache at `path`
    ///
    /// The file is read lazily on the first [`get_handle`](CredentialProvider::get_handle).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            path: path.into(),
            http_client,
            cached: Mutex::new(None),
        })
    }

    /// Token cache location
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StoredToken> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Auth(format!(
                    "no token cache at {}; complete the consent flow first",
                    self.path.display()
                )));
            }
            Err(e) => return Err(Error::Io(e)),
        };
        serde_json::from_str(&contents).map_err(|e| {
            Error::Auth(format!(
                "token cache at {} is unreadable: {e}",
                self.path.display()
            ))
        })
    }

    async fn refresh(&self, stored: &StoredToken) -> Result<StoredToken> {
        let Some(refresh_token) = stored.refresh_token.as_deref() else {
            return Err(Error::Auth(
                "access token expired and no refresh token is cached".into(),
            ));
        };

        let mut form = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        if let Some(client_id) = stored.client_id.as_deref() {
            form.push(("client_id", client_id));
        }
        if let Some(client_secret) = stored.client_secret.as_deref() {
            form.push(("client_secret", client_secret));
        }

        let response = self
            .http_client
            .post(&stored.token_uri)
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "token refresh rejected with status {status}: {body}"
            )));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("token refresh returned invalid JSON: {e}")))?;

        let mut updated = stored.clone();
        updated.token = refreshed.access_token;
        updated.expiry = refreshed
            .expires_in
            .map(|secs| Utc::now() + TimeDelta::seconds(secs));
        if let Some(rotated) = refreshed.refresh_token {
            updated.refresh_token = Some(rotated);
        }
        Ok(updated)
    }

    async fn persist(&self, token: &StoredToken) -> Result<()> {
        let json = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialProvider for TokenFileCredentials {
    async fn get_handle(&self) -> Result<AuthHandle> {
        let mut cached = self.cached.lock().await;

        let current = match cached.take() {
            Some(token) => token,
            None => self.load().await?,
        };

        if current.is_fresh(Utc::now()) {
            let handle = AuthHandle::new(current.token.clone());
            *cached = Some(current);
            return Ok(handle);
        }

        tracing::info!(path = %self.path.display(), "refreshing expired access token");
        let refreshed = self.refresh(&current).await?;
        if let Err(e) = self.persist(&refreshed).await {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to write refreshed token cache");
        }
        let handle = AuthHandle::new(refreshed.token.clone());
        *cached = Some(refreshed);
        Ok(handle)
    }
}

/// A fixed access token, never refreshed
#[derive(Clone, Debug)]
pub struct StaticCredentials {
    handle: AuthHandle,
}

impl StaticCredentials {
    /// Wrap a known-good access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            handle: AuthHandle::new(access_token),
        }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn get_handle(&self) -> Result<AuthHandle> {
        Ok(self.handle.clone())
    }
}
