use chrono::{DateTime, Duration, Utc};
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// OAuth scope that allows uploads and playlist management.
pub const YOUTUBE_SCOPE: &str = "https://www.googleapis.com/auth/youtube.force-ssl";

/// Seconds before expiry at which a token is treated as expired.
pub const EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth 2.0 token set.
///
/// # Security
///
/// Tokens should be stored securely and never logged. The `Debug` implementation
/// redacts sensitive information.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("ya29.a0...".to_string(), Some("1//0g...".to_string()), 3600);
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    /// The refresh token used to obtain new access tokens
    pub refresh_token: Option<String>,
    /// When the access token expires (UTC); `None` when unknown
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthTokens {
    /// Create a new token set that expires `expires_in` seconds from now
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Some(Utc::now() + Duration::seconds(expires_in)),
        }
    }

    /// Check if the access token is expired or will expire within five minutes
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(EXPIRY_BUFFER_SECS)
    }

    /// Check if the access token is expired with a custom buffer
    ///
    /// A token without a known expiry is never considered expired.
    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at - Duration::seconds(buffer_seconds),
            None => false,
        }
    }
}

// Custom Debug implementation to avoid logging tokens
impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Contents of an authorized-user token file (`token.json`).
///
/// Unknown fields are preserved so that rewriting the file after a refresh
/// does not drop data written by other tools.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    /// Current access token; may be missing in a freshly exported file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_uri() -> String {
    crate::oauth::GOOGLE_TOKEN_URI.to_string()
}

impl AuthorizedUser {
    /// Current token set as stored in the file
    pub fn tokens(&self) -> Option<OAuthTokens> {
        self.token.as_ref().map(|access_token| OAuthTokens {
            access_token: access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            expires_at: self.expiry,
        })
    }

    /// Store a refreshed token set
    pub fn apply(&mut self, tokens: &OAuthTokens) {
        self.token = Some(tokens.access_token.clone());
        if let Some(refresh_token) = &tokens.refresh_token {
            self.refresh_token = Some(refresh_token.clone());
        }
        self.expiry = tokens.expires_at;
    }

    /// Account the token belongs to, safe to log
    pub fn account_for_logs(&self) -> Option<String> {
        self.extra
            .get("account")
            .and_then(|value| value.as_str())
            .filter(|account| !account.is_empty())
            .map(|account| redact_if_sensitive("account", account))
    }

    /// Whether the granted scopes cover uploads (an empty list is not checked)
    pub fn has_upload_scope(&self) -> bool {
        self.scopes.is_empty()
            || self
                .scopes
                .iter()
                .any(|scope| scope == YOUTUBE_SCOPE || scope.ends_with("/auth/youtube"))
    }
}

impl fmt::Debug for AuthorizedUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizedUser")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_uri", &self.token_uri)
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("expiry", &self.expiry)
            .finish()
    }
}
