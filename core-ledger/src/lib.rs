//! # Upload Ledger
//!
//! Local record of which playlists were resolved and which files were
//! uploaded. A path present in the ledger is never uploaded again.
//!
//! Two interchangeable backends implement [`Ledger`]:
//! - [`SqliteLedger`]: transactional, safe to inspect while a run is active
//! - [`CsvLedger`]: append-only delimited text, single process only
//!
//! [`open_ledger`] picks one from a [`LedgerConfig`].

pub mod csv_store;
pub mod db;
pub mod error;
pub mod models;
pub mod sqlite;

pub use csv_store::CsvLedger;
pub use error::{LedgerError, Result};
pub use models::{PlaylistRecord, VideoRecord, DRY_RUN_PLAYLIST_PREFIX, DRY_RUN_VIDEO_PREFIX};
pub use sqlite::SqliteLedger;

use async_trait::async_trait;
use core_runtime::config::{LedgerBackend, LedgerConfig};
use std::sync::Arc;
use tracing::info;

/// Persistent playlist and video mappings
///
/// Lookups return `Ok(None)` on a miss. Upserts replace the record with the
/// same key (file path for videos, name for playlists) and are idempotent.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Exact match on `file_path`
    async fn find_video(&self, file_path: &str) -> Result<Option<VideoRecord>>;

    /// Write or replace the record keyed by `record.file_path`
    async fn upsert_video(&self, record: &VideoRecord) -> Result<()>;

    /// Exact match on the derived playlist name
    async fn find_playlist(&self, name: &str) -> Result<Option<PlaylistRecord>>;

    /// Write or replace the record keyed by `record.name`
    async fn upsert_playlist(&self, record: &PlaylistRecord) -> Result<()>;

    /// All video records, ordered by file path
    async fn list_videos(&self) -> Result<Vec<VideoRecord>>;

    /// All playlist records, ordered by name
    async fn list_playlists(&self) -> Result<Vec<PlaylistRecord>>;

    /// Record a preview-mode entry carrying a synthesized id
    async fn record_dry_run_video(
        &self,
        title: &str,
        playlist_id: &str,
        file_path: &str,
    ) -> Result<VideoRecord> {
        let record = VideoRecord::dry_run(title, playlist_id, file_path);
        self.upsert_video(&record).await?;
        Ok(record)
    }
}

/// Open the backend named by `config`, creating its files on first use.
pub async fn open_ledger(config: &LedgerConfig) -> Result<Arc<dyn Ledger>> {
    info!(
        backend = config.backend.as_str(),
        path = %config.path.display(),
        "Opening ledger"
    );

    let ledger: Arc<dyn Ledger> = match config.backend {
        LedgerBackend::Sqlite => Arc::new(SqliteLedger::open(&config.path).await?),
        LedgerBackend::Csv => Arc::new(CsvLedger::open(&config.path).await?),
    };
    Ok(ledger)
}
