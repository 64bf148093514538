//! Credential providers
//!
//! Implementations of [`CredentialProvider`] handed to the video-hosting
//! connectors.

use async_trait::async_trait;
use bridge_traits::credentials::CredentialProvider;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::HttpClient;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{AuthError, Result};
use crate::oauth::TokenRefresher;
use crate::types::AuthorizedUser;

/// A fixed bearer token.
///
/// Useful when the host obtains tokens by other means, and in tests.
#[derive(Clone)]
pub struct StaticTokenCredentials {
    token: String,
}

impl StaticTokenCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenCredentials")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticTokenCredentials {
    async fn access_token(&self) -> BridgeResult<String> {
        Ok(self.token.clone())
    }
}

/// Credentials backed by an authorized-user token file.
///
/// The access token is refreshed when it is missing or about to expire, and
/// the file is rewritten with the new token so later runs start warm.
pub struct TokenFileCredentials {
    path: PathBuf,
    refresher: TokenRefresher,
    user: Mutex<AuthorizedUser>,
}

impl TokenFileCredentials {
    /// Load the token file at `path`.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NotAuthenticated`] if the file does not exist
    /// - [`AuthError::InvalidTokenFile`] if it cannot be parsed or has no
    ///   usable token
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>, http_client: Arc<dyn HttpClient>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::NotAuthenticated(format!(
                    "token file {} not found; authorize the account first",
                    path.display()
                )))
            }
            Err(e) => return Err(AuthError::Io(e)),
        };

        let user: AuthorizedUser =
            serde_json::from_slice(&raw).map_err(|e| AuthError::InvalidTokenFile {
                path: path.clone(),
                message: e.to_string(),
            })?;

        if user.token.is_none() && user.refresh_token.is_none() {
            return Err(AuthError::InvalidTokenFile {
                path,
                message: "neither an access token nor a refresh token is present".to_string(),
            });
        }

        if !user.has_upload_scope() {
            warn!(scopes = ?user.scopes, "Token file does not list the YouTube scope");
        }

        let refresher = TokenRefresher::new(
            http_client,
            user.token_uri.clone(),
            user.client_id.clone(),
            user.client_secret.clone(),
        );

        let account = user.account_for_logs().unwrap_or_else(|| "unknown".to_string());
        debug!(client_id = %user.client_id, %account, "Loaded token file");

        Ok(Self {
            path,
            refresher,
            user: Mutex::new(user),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return a valid access token, refreshing and persisting it if needed.
    pub async fn current_token(&self) -> Result<String> {
        let mut user = self.user.lock().await;

        if let Some(tokens) = user.tokens() {
            if !tokens.is_expired() {
                return Ok(tokens.access_token);
            }
        }

        let refresh_token = user.refresh_token.clone().ok_or_else(|| {
            AuthError::NotAuthenticated(format!(
                "access token in {} expired and no refresh token is available",
                self.path.display()
            ))
        })?;

        let tokens = self.refresher.refresh_access_token(&refresh_token).await?;
        user.apply(&tokens);
        self.persist(&user).await;

        info!("Access token refreshed");
        Ok(tokens.access_token)
    }

    /// Write the refreshed token back. A failed write only costs a refresh
    /// on the next run, so it is logged and ignored.
    async fn persist(&self, user: &AuthorizedUser) {
        let serialized = match serde_json::to_vec_pretty(user) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(error = %e, "Failed to serialize refreshed token");
                return;
            }
        };

        if let Err(e) = tokio::fs::write(&self.path, serialized).await {
            warn!(error = %e, path = %self.path.display(), "Failed to persist refreshed token");
        }
    }
}

impl fmt::Debug for TokenFileCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenFileCredentials")
            .field("path", &self.path)
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for TokenFileCredentials {
    async fn access_token(&self) -> BridgeResult<String> {
        Ok(self.current_token().await?)
    }
}
