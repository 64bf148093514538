//! Video Hosting Abstractions
//!
//! Defines the operations the uploader needs from a remote video-hosting
//! service: playlist listing and creation, resumable chunked uploads, and
//! playlist attachment.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{BridgeError, Result};

/// Reason code a service reports when the account's API quota is used up
pub const QUOTA_EXCEEDED_REASON: &str = "quotaExceeded";

/// Visibility of a remote playlist or video
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyStatus {
    Private,
    Unlisted,
    Public,
}

impl PrivacyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyStatus::Private => "private",
            PrivacyStatus::Unlisted => "unlisted",
            PrivacyStatus::Public => "public",
        }
    }
}

impl fmt::Display for PrivacyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "private" => Ok(PrivacyStatus::Private),
            "unlisted" => Ok(PrivacyStatus::Unlisted),
            "public" => Ok(PrivacyStatus::Public),
            other => Err(BridgeError::OperationFailed(format!(
                "Unknown privacy status: {}",
                other
            ))),
        }
    }
}

/// A playlist owned by the authenticated account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePlaylist {
    pub id: String,
    pub title: String,
}

/// A video that finished uploading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteVideo {
    pub id: String,
    pub title: String,
}

/// Metadata sent when a resumable upload session is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: PrivacyStatus,
}

/// Handle to an open resumable upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Server-issued URI that receives the chunks
    pub session_uri: String,
    /// Size of the whole payload in bytes
    pub total_bytes: u64,
}

/// Server-side state of a resumable upload after a chunk or status query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkStatus {
    /// The server holds `bytes_received` bytes and expects more.
    Incomplete { bytes_received: u64 },
    /// The upload is finished and the video exists remotely.
    Complete(RemoteVideo),
}

impl ChunkStatus {
    /// Bytes the server acknowledged, given the total payload size.
    pub fn bytes_received(&self, total_bytes: u64) -> u64 {
        match self {
            ChunkStatus::Incomplete { bytes_received } => *bytes_received,
            ChunkStatus::Complete(_) => total_bytes,
        }
    }
}

/// Remote video-hosting service
///
/// Implementations translate each call into the provider's API and report
/// failures as [`BridgeError::Remote`] (with status and reason) or
/// [`BridgeError::Network`]. They must not retry on their own; callers own
/// the retry policy.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::video::{VideoHostingService, PrivacyStatus};
///
/// async fn ensure_playlist(service: &dyn VideoHostingService, name: &str) -> Result<String> {
///     let existing = service.list_playlists().await?;
///     if let Some(playlist) = existing.into_iter().find(|p| p.title == name) {
///         return Ok(playlist.id);
///     }
///     Ok(service.create_playlist(name, PrivacyStatus::Private).await?.id)
/// }
/// ```
#[async_trait]
pub trait VideoHostingService: Send + Sync {
    /// List every playlist owned by the authenticated account
    async fn list_playlists(&self) -> Result<Vec<RemotePlaylist>>;

    /// Create a playlist with the given title and visibility
    async fn create_playlist(&self, title: &str, privacy: PrivacyStatus)
        -> Result<RemotePlaylist>;

    /// Open a resumable upload session for a payload of `total_bytes`
    async fn begin_upload(
        &self,
        metadata: &VideoMetadata,
        total_bytes: u64,
        content_type: &str,
    ) -> Result<UploadSession>;

    /// Send the bytes starting at `offset`
    async fn upload_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Bytes,
    ) -> Result<ChunkStatus>;

    /// Ask the server how much of the session it already holds
    async fn query_upload(&self, session: &UploadSession) -> Result<ChunkStatus>;

    /// Append a video to a playlist
    async fn add_to_playlist(&self, playlist_id: &str, video_id: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_status_round_trip() {
        for status in [
            PrivacyStatus::Private,
            PrivacyStatus::Unlisted,
            PrivacyStatus::Public,
        ] {
            assert_eq!(status.as_str().parse::<PrivacyStatus>().unwrap(), status);
        }
        assert_eq!("PRIVATE".parse::<PrivacyStatus>().unwrap(), PrivacyStatus::Private);
        assert!("secret".parse::<PrivacyStatus>().is_err());
    }

    #[test]
    fn test_privacy_status_serializes_lowercase() {
        let json = serde_json::to_string(&PrivacyStatus::Unlisted).unwrap();
        assert_eq!(json, "\"unlisted\"");
    }

    #[test]
    fn test_chunk_status_bytes_received() {
        let partial = ChunkStatus::Incomplete { bytes_received: 512 };
        let done = ChunkStatus::Complete(RemoteVideo {
            id: "abc".to_string(),
            title: "clip".to_string(),
        });

        assert_eq!(partial.bytes_received(1024), 512);
        assert_eq!(done.bytes_received(1024), 1024);
    }
}
