use core_ledger::LedgerError;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a run, a playlist resolution or a single file
#[derive(Error, Debug)]
pub enum UploadError {
    /// The service refuses further work until the quota resets
    #[error("Upload quota exceeded: {0}")]
    QuotaExceeded(String),

    /// A connection reset or 5xx answer; worth retrying
    #[error("Transient transport failure: {0}")]
    TransientTransport(String),

    #[error("Transfer failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// The service rejected the request; retrying will not help
    #[error("Remote service rejected the request (status {}): {message}", .status.map(|s| s.to_string()).unwrap_or_else(|| "none".to_string()))]
    PermanentRemote {
        status: Option<u16>,
        reason: Option<String>,
        message: String,
    },

    /// The video exists remotely but is not in its playlist
    #[error("Video {video_id} uploaded but not added to playlist {playlist_id}: {message}")]
    AttachmentFailed {
        video_id: String,
        playlist_id: String,
        message: String,
    },

    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(#[from] LedgerError),

    #[error("Cannot read {}: {message}", .path.display())]
    LocalIo { path: PathBuf, message: String },

    #[error("Credentials unavailable: {0}")]
    Credentials(String),

    #[error("Capability missing: {0}")]
    CapabilityMissing(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] core_runtime::Error),
}

impl UploadError {
    /// Whether the whole batch must stop rather than move on to the next file
    pub fn is_batch_fatal(&self) -> bool {
        matches!(
            self,
            UploadError::QuotaExceeded(_)
                | UploadError::LedgerUnavailable(_)
                | UploadError::Credentials(_)
        )
    }

    pub(crate) fn local_io(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        UploadError::LocalIo {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_fatal_classification() {
        assert!(UploadError::QuotaExceeded("quota".into()).is_batch_fatal());
        assert!(UploadError::Credentials("expired".into()).is_batch_fatal());
        assert!(UploadError::LedgerUnavailable(LedgerError::Task("gone".into())).is_batch_fatal());

        assert!(!UploadError::RetriesExhausted {
            attempts: 5,
            message: "reset".into()
        }
        .is_batch_fatal());
        assert!(!UploadError::local_io("/v/a.mp4", "permission denied").is_batch_fatal());
        assert!(!UploadError::PermanentRemote {
            status: Some(400),
            reason: Some("invalidTitle".into()),
            message: "bad".into()
        }
        .is_batch_fatal());
    }

    #[test]
    fn test_display() {
        let err = UploadError::PermanentRemote {
            status: Some(400),
            reason: None,
            message: "bad request".into(),
        };
        assert_eq!(
            err.to_string(),
            "Remote service rejected the request (status 400): bad request"
        );
        assert!(UploadError::local_io("/v/a.mp4", "empty file")
            .to_string()
            .contains("/v/a.mp4"));
    }
}
