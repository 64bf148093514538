use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote service answered with a non-success status.
    ///
    /// `reason` is the machine-readable reason code when the service provides one.
    #[error("Remote service error {status} ({}): {message}", .reason.as_deref().unwrap_or("unspecified"))]
    Remote {
        status: u16,
        reason: Option<String>,
        message: String,
    },

    /// The request never produced a response (connection reset, DNS, TLS, timeout).
    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// HTTP status of a remote failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Machine-readable reason of a remote failure, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            BridgeError::Remote { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_display_includes_reason() {
        let err = BridgeError::Remote {
            status: 403,
            reason: Some("quotaExceeded".to_string()),
            message: "The request cannot be completed".to_string(),
        };

        assert_eq!(err.status(), Some(403));
        assert_eq!(err.reason(), Some("quotaExceeded"));
        assert!(err.to_string().contains("403 (quotaExceeded)"));
    }

    #[test]
    fn test_remote_error_without_reason() {
        let err = BridgeError::Remote {
            status: 400,
            reason: None,
            message: "bad".to_string(),
        };

        assert_eq!(err.reason(), None);
        assert!(err.to_string().contains("unspecified"));
        assert_eq!(BridgeError::Network("reset".into()).status(), None);
    }
}
