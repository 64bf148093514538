//! Failure classification and backoff
//!
//! Every remote failure falls in one of three classes: quota exhaustion
//! stops the batch, transient failures are retried with exponential backoff,
//! anything else fails the file. Credential failures are kept apart because
//! no later file can succeed without a token either.

use bridge_traits::error::BridgeError;
use bridge_traits::video::QUOTA_EXCEEDED_REASON;
use core_runtime::config::TransferSettings;
use std::time::Duration;

use crate::error::UploadError;

/// How a failed remote call should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Quota,
    Transient,
    Permanent,
    Credentials,
}

/// Classify a remote failure.
pub fn classify(error: &BridgeError) -> FailureKind {
    match error {
        BridgeError::Remote {
            status: 403,
            reason: Some(reason),
            ..
        } if reason == QUOTA_EXCEEDED_REASON => FailureKind::Quota,
        BridgeError::Remote { status, .. } if (500..600).contains(status) => FailureKind::Transient,
        BridgeError::Network(_) => FailureKind::Transient,
        BridgeError::NotAvailable(_) => FailureKind::Credentials,
        _ => FailureKind::Permanent,
    }
}

/// Map a failure that will not be retried to the error reported for it.
///
/// Transient failures only reach this point once retries are exhausted; with
/// a single-attempt policy nothing was retried and the failure is reported
/// as it is.
pub fn into_upload_error(error: BridgeError, attempts: u32) -> UploadError {
    match classify(&error) {
        FailureKind::Quota => UploadError::QuotaExceeded(error.to_string()),
        FailureKind::Credentials => UploadError::Credentials(error.to_string()),
        FailureKind::Transient if attempts <= 1 => {
            UploadError::TransientTransport(error.to_string())
        }
        FailureKind::Transient => UploadError::RetriesExhausted {
            attempts,
            message: error.to_string(),
        },
        FailureKind::Permanent => UploadError::PermanentRemote {
            status: error.status(),
            reason: error.reason().map(str::to_string),
            message: error.to_string(),
        },
    }
}

/// Bounded exponential backoff
///
/// With the defaults the waits before attempts 2 to 5 are 5, 10, 20 and
/// 40 seconds, and there is no sixth attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: u32,
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier: multiplier.max(1),
        }
    }

    /// Wait before the attempt that follows failed attempt `attempt` (1-based),
    /// or `None` when no attempts remain.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let factor = self
            .multiplier
            .saturating_pow(attempt.saturating_sub(1));
        Some(self.initial_delay.saturating_mul(factor))
    }
}

impl From<&TransferSettings> for BackoffPolicy {
    fn from(settings: &TransferSettings) -> Self {
        Self::new(
            settings.max_attempts,
            settings.initial_backoff,
            settings.backoff_multiplier,
        )
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from(&TransferSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(status: u16, reason: Option<&str>) -> BridgeError {
        BridgeError::Remote {
            status,
            reason: reason.map(str::to_string),
            message: "failed".to_string(),
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(&remote(403, Some("quotaExceeded"))), FailureKind::Quota);
        assert_eq!(classify(&remote(403, Some("forbidden"))), FailureKind::Permanent);
        assert_eq!(classify(&remote(403, None)), FailureKind::Permanent);
        assert_eq!(classify(&remote(400, Some("invalidTitle"))), FailureKind::Permanent);
        for status in [500, 502, 503, 504] {
            assert_eq!(classify(&remote(status, None)), FailureKind::Transient);
        }
        assert_eq!(
            classify(&BridgeError::Network("connection reset".into())),
            FailureKind::Transient
        );
        assert_eq!(
            classify(&BridgeError::NotAvailable("token expired".into())),
            FailureKind::Credentials
        );
        assert_eq!(
            classify(&BridgeError::OperationFailed("parse".into())),
            FailureKind::Permanent
        );
    }

    #[test]
    fn test_default_backoff_schedule() {
        let policy = BackoffPolicy::default();
        let delays: Vec<_> = (1..=5).map(|attempt| policy.delay_after(attempt)).collect();

        assert_eq!(
            delays,
            vec![
                Some(Duration::from_secs(5)),
                Some(Duration::from_secs(10)),
                Some(Duration::from_secs(20)),
                Some(Duration::from_secs(40)),
                None,
            ]
        );
    }

    #[test]
    fn test_single_attempt_never_waits() {
        let policy = BackoffPolicy::new(1, Duration::from_secs(5), 2);
        assert_eq!(policy.delay_after(1), None);
    }

    #[test]
    fn test_into_upload_error() {
        assert!(matches!(
            into_upload_error(remote(403, Some("quotaExceeded")), 1),
            UploadError::QuotaExceeded(_)
        ));
        assert!(matches!(
            into_upload_error(remote(503, None), 5),
            UploadError::RetriesExhausted { attempts: 5, .. }
        ));
        assert!(matches!(
            into_upload_error(BridgeError::Network("reset".into()), 1),
            UploadError::TransientTransport(_)
        ));
        match into_upload_error(remote(400, Some("invalidTitle")), 1) {
            UploadError::PermanentRemote { status, reason, .. } => {
                assert_eq!(status, Some(400));
                assert_eq!(reason.as_deref(), Some("invalidTitle"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
