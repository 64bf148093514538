//! # YouTube Provider
//!
//! Implements `VideoHostingService` for the YouTube Data API v3.
//!
//! ## Overview
//!
//! This module provides:
//! - Paginated listing of the account's playlists
//! - Playlist creation and playlist item insertion
//! - Resumable uploads: session start, chunk transfer, status query
//! - Mapping of API error bodies to status and reason codes

pub mod connector;
pub mod error;
pub mod types;

pub use connector::{YouTubeConnector, YOUTUBE_API_BASE, YOUTUBE_UPLOAD_BASE};
pub use error::{Result, YouTubeError, QUOTA_EXCEEDED_REASON};
