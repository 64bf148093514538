//! Credential Abstraction
//!
//! Supplies bearer tokens to connectors that talk to authenticated APIs.

use async_trait::async_trait;

use crate::error::Result;

/// Source of a valid access token
///
/// Implementations refresh expired tokens transparently. A failure here means
/// no authenticated call can be made at all.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// Return a bearer token that is valid for at least the next request
    async fn access_token(&self) -> Result<String>;
}
