//! YouTube Data API request and response types
//!
//! Only the fields the uploader reads or writes are modelled.

use serde::{Deserialize, Serialize};

/// playlists.list response
///
/// See: https://developers.google.com/youtube/v3/docs/playlists/list
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistListResponse {
    #[serde(default)]
    pub items: Vec<PlaylistResource>,

    /// Token for the next page
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Playlist resource
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistResource {
    pub id: String,
    pub snippet: PlaylistSnippet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSnippet {
    pub title: String,
}

/// Resource visibility
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub privacy_status: String,
}

/// playlists.insert request body
#[derive(Debug, Serialize)]
pub struct PlaylistInsert {
    pub snippet: PlaylistSnippet,
    pub status: Status,
}

/// Metadata part of videos.insert
///
/// See: https://developers.google.com/youtube/v3/docs/videos/insert
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
}

/// videos.insert request body
#[derive(Debug, Serialize)]
pub struct VideoInsert {
    pub snippet: VideoSnippet,
    pub status: Status,
}

/// Video resource returned when an upload completes
#[derive(Debug, Deserialize)]
pub struct VideoResource {
    pub id: String,
    #[serde(default)]
    pub snippet: Option<VideoResourceSnippet>,
}

#[derive(Debug, Deserialize)]
pub struct VideoResourceSnippet {
    pub title: String,
}

/// playlistItems.insert request body
#[derive(Debug, Serialize)]
pub struct PlaylistItemInsert {
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    pub playlist_id: String,
    pub resource_id: ResourceId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    pub kind: String,
    pub video_id: String,
}

impl PlaylistItemInsert {
    pub fn video(playlist_id: &str, video_id: &str) -> Self {
        Self {
            snippet: PlaylistItemSnippet {
                playlist_id: playlist_id.to_string(),
                resource_id: ResourceId {
                    kind: "youtube#video".to_string(),
                    video_id: video_id.to_string(),
                },
            },
        }
    }
}

/// Google API error envelope
///
/// `{"error": {"code": 403, "message": "...", "errors": [{"reason": "quotaExceeded"}]}}`
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_insert_serializes_camel_case() {
        let body = VideoInsert {
            snippet: VideoSnippet {
                title: "clip".to_string(),
                description: "desc".to_string(),
                tags: vec!["bulk".to_string()],
                category_id: "22".to_string(),
            },
            status: Status {
                privacy_status: "unlisted".to_string(),
            },
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["snippet"]["categoryId"], "22");
        assert_eq!(json["status"]["privacyStatus"], "unlisted");
    }

    #[test]
    fn test_playlist_item_insert() {
        let json = serde_json::to_value(PlaylistItemInsert::video("PL1", "vid1")).unwrap();
        assert_eq!(json["snippet"]["playlistId"], "PL1");
        assert_eq!(json["snippet"]["resourceId"]["kind"], "youtube#video");
        assert_eq!(json["snippet"]["resourceId"]["videoId"], "vid1");
    }

    #[test]
    fn test_playlist_list_without_items() {
        let response: PlaylistListResponse = serde_json::from_str(r#"{"kind":"x"}"#).unwrap();
        assert!(response.items.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_error_response_parsing() {
        let response: ErrorResponse = serde_json::from_str(
            r#"{"error":{"code":403,"message":"quota","errors":[{"reason":"quotaExceeded","domain":"youtube.quota"}]}}"#,
        )
        .unwrap();
        assert_eq!(response.error.code, 403);
        assert_eq!(response.error.errors[0].reason.as_deref(), Some("quotaExceeded"));
    }
}
