//! # Host Bridge Traits
//!
//! Capability traits the uploader core depends on, implemented per host.
//!
//! ## Overview
//!
//! This crate defines the contract between the upload core and the concrete
//! adapters. Each trait represents a capability the core requires but does not
//! implement itself.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations
//! - [`VideoHostingService`](video::VideoHostingService) - Playlists and resumable uploads
//!
//! ### Security
//! - [`CredentialProvider`](credentials::CredentialProvider) - Bearer tokens on demand
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source and sleeping for deterministic testing
//!
//! ## Implementations
//!
//! | Capability | Implementation Crate |
//! |------------|---------------------|
//! | `HttpClient` | `bridge-desktop` |
//! | `VideoHostingService` | `provider-youtube` |
//! | `CredentialProvider` | `core-auth` |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Remote
//! failures keep their HTTP status and machine-readable reason so that the
//! core can tell quota exhaustion, transient failures and permanent rejections
//! apart.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent usage
//! across async tasks.

pub mod credentials;
pub mod error;
pub mod http;
pub mod time;
pub mod video;

pub use error::BridgeError;

// Re-export commonly used types
pub use credentials::CredentialProvider;
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use time::{Clock, SystemClock};
pub use video::{
    ChunkStatus, PrivacyStatus, RemotePlaylist, RemoteVideo, UploadSession, VideoHostingService,
    VideoMetadata,
};
