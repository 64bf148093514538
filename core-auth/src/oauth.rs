//! OAuth 2.0 refresh-token grant
//!
//! Exchanges a long-lived refresh token for a fresh access token at the
//! provider's token endpoint.

use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{instrument, warn};

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;

/// Google's OAuth 2.0 token endpoint
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Client for the refresh-token grant.
pub struct TokenRefresher {
    http_client: Arc<dyn HttpClient>,
    token_uri: String,
    client_id: String,
    client_secret: Option<String>,
}

impl TokenRefresher {
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        token_uri: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Self {
        Self {
            http_client,
            token_uri: token_uri.into(),
            client_id: client_id.into(),
            client_secret,
        }
    }

    /// Refresh an access token using a refresh token
    ///
    /// Server errors are retried up to three times with exponential backoff.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenRefreshFailed`] if:
    /// - The refresh token is invalid or revoked (4xx, no retry)
    /// - The token endpoint keeps failing
    /// - The request cannot be sent
    #[instrument(skip(self, refresh_token), fields(token_uri = %self.token_uri))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.client_id.as_str()),
        ];
        if let Some(client_secret) = &self.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        tracing::debug!("Refreshing access token");

        let encoded_body = serde_urlencoded::to_string(&params)
            .map_err(|e| AuthError::Other(format!("Failed to encode token request: {}", e)))?;
        let body = Bytes::from(encoded_body);

        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = HttpRequest::new(HttpMethod::Post, self.token_uri.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.clone());

            let response = self
                .http_client
                .execute_with_retry(request, RetryPolicy::none())
                .await
                .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response.json().map_err(|e| {
                    AuthError::TokenRefreshFailed(format!("Failed to parse token response: {}", e))
                })?;

                tracing::info!(
                    expires_in = token_response.expires_in,
                    "Successfully refreshed access token"
                );

                return Ok(OAuthTokens::new(
                    token_response.access_token,
                    token_response
                        .refresh_token
                        .or_else(|| Some(refresh_token.to_string())),
                    token_response.expires_in,
                ));
            }

            let status = response.status;
            let error_body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if response.is_client_error() {
                warn!(status, "Token refresh rejected");
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token endpoint returned {}: {}",
                    status, error_body
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempts, status, error_body
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status,
                attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

/// Token response from the OAuth provider.
#[derive(Debug, Deserialize, Serialize)]
struct TokenResponse {
    access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::HttpResponse;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClientMock {}

        #[async_trait]
        impl HttpClient for HttpClientMock {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn execute_with_retry(
                &self,
                request: HttpRequest,
                policy: RetryPolicy,
            ) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    #[tokio::test]
    async fn test_refresh_sends_form_and_parses_tokens() {
        let mut mock = MockHttpClientMock::new();
        mock.expect_execute_with_retry()
            .withf(|req, _| {
                let body = String::from_utf8(req.body.clone().unwrap().to_vec()).unwrap();
                req.url == GOOGLE_TOKEN_URI
                    && body.contains("grant_type=refresh_token")
                    && body.contains("refresh_token=1%2F%2F0g")
                    && body.contains("client_secret=shh")
            })
            .times(1)
            .returning(|_, _| {
                Ok(response(
                    200,
                    r#"{"access_token":"ya29.fresh","expires_in":3599,"token_type":"Bearer"}"#,
                ))
            });

        let refresher = TokenRefresher::new(
            Arc::new(mock),
            GOOGLE_TOKEN_URI,
            "client",
            Some("shh".to_string()),
        );
        let tokens = refresher.refresh_access_token("1//0g").await.unwrap();

        assert_eq!(tokens.access_token, "ya29.fresh");
        assert_eq!(tokens.refresh_token.as_deref(), Some("1//0g"));
        assert!(!tokens.is_expired());
    }

    #[tokio::test]
    async fn test_refresh_client_error_is_not_retried() {
        let mut mock = MockHttpClientMock::new();
        mock.expect_execute_with_retry()
            .times(1)
            .returning(|_, _| Ok(response(400, r#"{"error":"invalid_grant"}"#)));

        let refresher = TokenRefresher::new(Arc::new(mock), GOOGLE_TOKEN_URI, "client", None);
        let err = refresher.refresh_access_token("revoked").await.unwrap_err();

        assert!(matches!(err, AuthError::TokenRefreshFailed(_)));
        assert!(err.to_string().contains("invalid_grant"));
    }

    #[tokio::test]
    async fn test_refresh_server_error_retries_then_fails() {
        let mut mock = MockHttpClientMock::new();
        mock.expect_execute_with_retry()
            .times(MAX_REFRESH_ATTEMPTS as usize)
            .returning(|_, _| Ok(response(503, "unavailable")));

        let refresher = TokenRefresher::new(Arc::new(mock), GOOGLE_TOKEN_URI, "client", None);
        let err = refresher.refresh_access_token("token").await.unwrap_err();

        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[test]
    fn test_token_response_deserialization_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token": "token"}"#).unwrap();
        assert_eq!(response.access_token, "token");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }
}
