use bridge_traits::BridgeError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Token file {path} is invalid: {message}")]
    InvalidTokenFile { path: PathBuf, message: String },

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<AuthError> for BridgeError {
    fn from(error: AuthError) -> Self {
        match error {
            AuthError::Io(e) => BridgeError::Io(e),
            other => BridgeError::NotAvailable(format!("Credentials unavailable: {}", other)),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
