//! # Authentication Module
//!
//! Credential providers for the video-hosting connectors.
//!
//! ## Overview
//!
//! The uploader never runs an interactive consent flow. It consumes an
//! existing authorized-user token file (as written by Google's client
//! libraries) and keeps the access token fresh through the OAuth 2.0
//! refresh-token grant, or it uses a fixed bearer token supplied by the host.
//!
//! ## Features
//!
//! - [`TokenFileCredentials`]: loads `token.json`, refreshes before expiry and
//!   writes the refreshed token back
//! - [`StaticTokenCredentials`]: a fixed bearer token
//! - Tokens never appear in `Debug` output or logs

pub mod credentials;
pub mod error;
pub mod oauth;
pub mod types;

pub use credentials::{StaticTokenCredentials, TokenFileCredentials};
pub use error::{AuthError, Result};
pub use oauth::{TokenRefresher, GOOGLE_TOKEN_URI};
pub use types::{AuthorizedUser, OAuthTokens, YOUTUBE_SCOPE};
