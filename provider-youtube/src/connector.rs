//! YouTube Data API connector
//!
//! Implements the `VideoHostingService` trait for YouTube Data API v3.

use async_trait::async_trait;
use bridge_traits::credentials::CredentialProvider;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::video::{
    ChunkStatus, PrivacyStatus, RemotePlaylist, RemoteVideo, UploadSession, VideoHostingService,
    VideoMetadata,
};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, YouTubeError};
use crate::types::{
    PlaylistInsert, PlaylistItemInsert, PlaylistListResponse, PlaylistResource, PlaylistSnippet,
    Status, VideoInsert, VideoResource, VideoSnippet,
};

/// YouTube Data API base URL
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Media upload base URL
pub const YOUTUBE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/youtube/v3";

/// Maximum results per page (API limit)
const MAX_PAGE_SIZE: u32 = 50;

/// Status the upload endpoint uses for "Resume Incomplete"
const RESUME_INCOMPLETE: u16 = 308;

const API_TIMEOUT: Duration = Duration::from_secs(30);
const CHUNK_TIMEOUT: Duration = Duration::from_secs(300);

/// YouTube Data API connector
///
/// Every call fetches a bearer token from the credential provider first. The
/// connector never retries; callers decide what is worth retrying.
///
/// # Example
///
/// ```ignore
/// use provider_youtube::YouTubeConnector;
/// use bridge_traits::video::VideoHostingService;
///
/// let connector = YouTubeConnector::new(http_client, credentials);
/// let playlists = connector.list_playlists().await?;
/// ```
pub struct YouTubeConnector {
    http_client: Arc<dyn HttpClient>,
    credentials: Arc<dyn CredentialProvider>,
    api_base: String,
    upload_base: String,
}

impl YouTubeConnector {
    pub fn new(http_client: Arc<dyn HttpClient>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            http_client,
            credentials,
            api_base: YOUTUBE_API_BASE.to_string(),
            upload_base: YOUTUBE_UPLOAD_BASE.to_string(),
        }
    }

    /// Point the connector at different endpoints (test servers, proxies)
    pub fn with_base_urls(mut self, api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self.upload_base = upload_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Request carrying a fresh bearer token
    async fn authorized(&self, method: HttpMethod, url: String) -> Result<HttpRequest> {
        let token = self
            .credentials
            .access_token()
            .await
            .map_err(|e| YouTubeError::AuthenticationFailed(e.to_string()))?;

        Ok(HttpRequest::new(method, url)
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(API_TIMEOUT))
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = request.method;
        let response = self.http_client.execute(request).await?;
        debug!(?method, status = response.status, "API response");
        Ok(response)
    }

    /// Fail with the API error unless the response is 2xx
    fn expect_success(response: HttpResponse) -> Result<HttpResponse> {
        if response.is_success() {
            Ok(response)
        } else {
            let error = YouTubeError::from_response(&response);
            warn!(status = response.status, error = %error, "API request failed");
            Err(error)
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body)
            .map_err(|e| YouTubeError::ParseError(format!("Failed to parse {}: {}", what, e)))
    }

    /// Translate a chunk or status-query response
    fn chunk_status(response: HttpResponse) -> Result<ChunkStatus> {
        match response.status {
            RESUME_INCOMPLETE => {
                let bytes_received = response
                    .header("Range")
                    .and_then(parse_range_end)
                    .map(|last| last + 1)
                    .unwrap_or(0);
                Ok(ChunkStatus::Incomplete { bytes_received })
            }
            200 | 201 => {
                let video: VideoResource = Self::parse(&response, "uploaded video")?;
                Ok(ChunkStatus::Complete(RemoteVideo {
                    id: video.id,
                    title: video.snippet.map(|s| s.title).unwrap_or_default(),
                }))
            }
            _ => Err(YouTubeError::from_response(&response)),
        }
    }

    fn convert_playlist(resource: PlaylistResource) -> RemotePlaylist {
        RemotePlaylist {
            id: resource.id,
            title: resource.snippet.title,
        }
    }
}

/// Last acknowledged byte offset from a `Range: bytes=0-N` header
fn parse_range_end(value: &str) -> Option<u64> {
    value
        .trim()
        .strip_prefix("bytes=")?
        .rsplit('-')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[async_trait]
impl VideoHostingService for YouTubeConnector {
    #[instrument(skip(self))]
    async fn list_playlists(&self) -> BridgeResult<Vec<RemotePlaylist>> {
        let mut playlists = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = format!(
                "{}/playlists?part=snippet&mine=true&maxResults={}",
                self.api_base, MAX_PAGE_SIZE
            );
            if let Some(token) = &page_token {
                url.push_str(&format!("&pageToken={}", urlencoding::encode(token)));
            }

            let request = self.authorized(HttpMethod::Get, url).await?;
            let response = Self::expect_success(self.send(request).await?)?;
            let page: PlaylistListResponse = Self::parse(&response, "playlist list")?;

            playlists.extend(page.items.into_iter().map(Self::convert_playlist));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        info!(count = playlists.len(), "Listed playlists");
        Ok(playlists)
    }

    #[instrument(skip(self))]
    async fn create_playlist(
        &self,
        title: &str,
        privacy: PrivacyStatus,
    ) -> BridgeResult<RemotePlaylist> {
        let url = format!("{}/playlists?part=snippet,status", self.api_base);
        let body = PlaylistInsert {
            snippet: PlaylistSnippet {
                title: title.to_string(),
            },
            status: Status {
                privacy_status: privacy.as_str().to_string(),
            },
        };

        let request = self.authorized(HttpMethod::Post, url).await?.json(&body)?;
        let response = Self::expect_success(self.send(request).await?)?;
        let created: PlaylistResource = Self::parse(&response, "created playlist")?;

        info!(playlist_id = %created.id, "Created playlist");
        Ok(Self::convert_playlist(created))
    }

    #[instrument(skip(self, metadata), fields(title = %metadata.title))]
    async fn begin_upload(
        &self,
        metadata: &VideoMetadata,
        total_bytes: u64,
        content_type: &str,
    ) -> BridgeResult<UploadSession> {
        let url = format!(
            "{}/videos?uploadType=resumable&part=snippet,status",
            self.upload_base
        );
        let body = VideoInsert {
            snippet: VideoSnippet {
                title: metadata.title.clone(),
                description: metadata.description.clone(),
                tags: metadata.tags.clone(),
                category_id: metadata.category_id.clone(),
            },
            status: Status {
                privacy_status: metadata.privacy.as_str().to_string(),
            },
        };

        let request = self
            .authorized(HttpMethod::Post, url)
            .await?
            .header("X-Upload-Content-Length", total_bytes.to_string())
            .header("X-Upload-Content-Type", content_type)
            .json(&body)?;

        let response = Self::expect_success(self.send(request).await?)?;
        let session_uri = response
            .header("Location")
            .ok_or(YouTubeError::MissingHeader {
                header: "Location",
                status_code: response.status,
            })?
            .to_string();

        debug!("Opened resumable upload session");
        Ok(UploadSession {
            session_uri,
            total_bytes,
        })
    }

    #[instrument(skip(self, session, chunk), fields(len = chunk.len()))]
    async fn upload_chunk(
        &self,
        session: &UploadSession,
        offset: u64,
        chunk: Bytes,
    ) -> BridgeResult<ChunkStatus> {
        if chunk.is_empty() {
            return Err(YouTubeError::ParseError("refusing to send an empty chunk".into()).into());
        }

        let last = offset + chunk.len() as u64 - 1;
        let request = self
            .authorized(HttpMethod::Put, session.session_uri.clone())
            .await?
            .header(
                "Content-Range",
                format!("bytes {}-{}/{}", offset, last, session.total_bytes),
            )
            .timeout(CHUNK_TIMEOUT)
            .body(chunk);

        let response = self.send(request).await?;
        Ok(Self::chunk_status(response)?)
    }

    #[instrument(skip(self, session))]
    async fn query_upload(&self, session: &UploadSession) -> BridgeResult<ChunkStatus> {
        let request = self
            .authorized(HttpMethod::Put, session.session_uri.clone())
            .await?
            .header("Content-Range", format!("bytes */{}", session.total_bytes))
            .body(Bytes::new());

        let response = self.send(request).await?;
        Ok(Self::chunk_status(response)?)
    }

    #[instrument(skip(self))]
    async fn add_to_playlist(&self, playlist_id: &str, video_id: &str) -> BridgeResult<()> {
        let url = format!("{}/playlistItems?part=snippet", self.api_base);
        let body = PlaylistItemInsert::video(playlist_id, video_id);

        let request = self.authorized(HttpMethod::Post, url).await?.json(&body)?;
        Self::expect_success(self.send(request).await?)?;

        debug!("Added video to playlist");
        Ok(())
    }
}
