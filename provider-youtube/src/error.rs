//! Error types for the YouTube provider

use bridge_traits::error::BridgeError;
use bridge_traits::http::HttpResponse;
use thiserror::Error;

use crate::types::ErrorResponse;

pub use bridge_traits::video::QUOTA_EXCEEDED_REASON;

/// YouTube provider errors
#[derive(Error, Debug)]
pub enum YouTubeError {
    /// No usable access token
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("YouTube API error (status {status_code}, reason {}): {message}", .reason.as_deref().unwrap_or("none"))]
    ApiError {
        status_code: u16,
        reason: Option<String>,
        message: String,
    },

    /// A response lacked a header the protocol requires
    #[error("Response with status {status_code} is missing the {header} header")]
    MissingHeader {
        header: &'static str,
        status_code: u16,
    },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for YouTube operations
pub type Result<T> = std::result::Result<T, YouTubeError>;

impl YouTubeError {
    /// Build an [`YouTubeError::ApiError`] from a non-success response.
    ///
    /// `quotaExceeded` wins if any detail in the error envelope carries it,
    /// otherwise the first reason is kept. Bodies that are not a Google error
    /// envelope are carried as the message.
    pub fn from_response(response: &HttpResponse) -> Self {
        match serde_json::from_slice::<ErrorResponse>(&response.body) {
            Ok(parsed) => {
                let reasons: Vec<&str> = parsed
                    .error
                    .errors
                    .iter()
                    .filter_map(|detail| detail.reason.as_deref())
                    .collect();
                let reason = reasons
                    .iter()
                    .find(|reason| **reason == QUOTA_EXCEEDED_REASON)
                    .or_else(|| reasons.first())
                    .map(|reason| reason.to_string());

                YouTubeError::ApiError {
                    status_code: response.status,
                    reason,
                    message: parsed.error.message,
                }
            }
            Err(_) => YouTubeError::ApiError {
                status_code: response.status,
                reason: None,
                message: String::from_utf8_lossy(&response.body).trim().to_string(),
            },
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(
            self,
            YouTubeError::ApiError { status_code: 403, reason: Some(reason), .. }
                if reason == QUOTA_EXCEEDED_REASON
        )
    }
}

impl From<YouTubeError> for BridgeError {
    fn from(error: YouTubeError) -> Self {
        match error {
            YouTubeError::AuthenticationFailed(msg) => {
                BridgeError::NotAvailable(format!("Authentication failed: {}", msg))
            }
            YouTubeError::ApiError {
                status_code,
                reason,
                message,
            } => BridgeError::Remote {
                status: status_code,
                reason,
                message,
            },
            error @ YouTubeError::MissingHeader { .. } => {
                BridgeError::OperationFailed(error.to_string())
            }
            YouTubeError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            YouTubeError::BridgeError(e) => e,
        }
    }
}
