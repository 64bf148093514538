//! Ledger records
//!
//! Field order matches the column order of the CSV backend
//! (`id,title,playlist_id,file_path` and `id,name`).

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Prefix of the synthesized id given to videos recorded in preview mode.
pub const DRY_RUN_VIDEO_PREFIX: &str = "dry_run_video_";

/// Prefix of the synthesized id given to playlists resolved in preview mode.
pub const DRY_RUN_PLAYLIST_PREFIX: &str = "dry_run_playlist_";

/// A remote playlist keyed by its derived name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlaylistRecord {
    pub id: String,
    pub name: String,
}

impl PlaylistRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Synthesized record for preview runs.
    pub fn dry_run(name: &str) -> Self {
        Self::new(format!("{}{}", DRY_RUN_PLAYLIST_PREFIX, name), name)
    }

    pub fn is_dry_run(&self) -> bool {
        self.id.starts_with(DRY_RUN_PLAYLIST_PREFIX)
    }
}

/// An uploaded video keyed by the local file path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub playlist_id: String,
    pub file_path: String,
}

impl VideoRecord {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        playlist_id: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            playlist_id: playlist_id.into(),
            file_path: file_path.into(),
        }
    }

    /// Synthesized record for preview runs.
    pub fn dry_run(title: &str, playlist_id: &str, file_path: &str) -> Self {
        Self::new(
            format!("{}{}", DRY_RUN_VIDEO_PREFIX, title),
            title,
            playlist_id,
            file_path,
        )
    }

    pub fn is_dry_run(&self) -> bool {
        self.id.starts_with(DRY_RUN_VIDEO_PREFIX)
    }
}
