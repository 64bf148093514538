//! SQLite ledger backend

use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};
use std::path::Path;
use tracing::{debug, instrument};

use crate::db::{create_pool, DatabaseConfig};
use crate::error::Result;
use crate::models::{PlaylistRecord, VideoRecord};
use crate::Ledger;

/// Ledger stored in an SQLite database
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the database file at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(create_pool(DatabaseConfig::new(path)).await?))
    }

    /// Fresh in-memory ledger
    pub async fn in_memory() -> Result<Self> {
        Ok(Self::new(create_pool(DatabaseConfig::in_memory()).await?))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Ledger for SqliteLedger {
    async fn find_video(&self, file_path: &str) -> Result<Option<VideoRecord>> {
        let record = query_as::<_, VideoRecord>(
            "SELECT id, title, playlist_id, file_path FROM videos WHERE file_path = ?",
        )
        .bind(file_path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self, record), fields(file_path = %record.file_path))]
    async fn upsert_video(&self, record: &VideoRecord) -> Result<()> {
        query(
            r#"
            INSERT INTO videos (file_path, id, title, playlist_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(file_path) DO UPDATE SET
                id = excluded.id,
                title = excluded.title,
                playlist_id = excluded.playlist_id
            "#,
        )
        .bind(&record.file_path)
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.playlist_id)
        .execute(&self.pool)
        .await?;

        debug!(video_id = %record.id, "Video recorded");
        Ok(())
    }

    async fn find_playlist(&self, name: &str) -> Result<Option<PlaylistRecord>> {
        let record =
            query_as::<_, PlaylistRecord>("SELECT id, name FROM playlists WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(record)
    }

    #[instrument(skip(self, record), fields(name = %record.name))]
    async fn upsert_playlist(&self, record: &PlaylistRecord) -> Result<()> {
        query(
            r#"
            INSERT INTO playlists (name, id)
            VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET id = excluded.id
            "#,
        )
        .bind(&record.name)
        .bind(&record.id)
        .execute(&self.pool)
        .await?;

        debug!(playlist_id = %record.id, "Playlist recorded");
        Ok(())
    }

    async fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        let records = query_as::<_, VideoRecord>(
            "SELECT id, title, playlist_id, file_path FROM videos ORDER BY file_path",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_playlists(&self) -> Result<Vec<PlaylistRecord>> {
        let records = query_as::<_, PlaylistRecord>("SELECT id, name FROM playlists ORDER BY name")
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_missing_video_is_none() {
        let ledger = SqliteLedger::in_memory().await.unwrap();
        assert!(ledger.find_video("/nope.mp4").await.unwrap().is_none());
        assert!(ledger.find_playlist("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_video_replaces_by_path() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        let dry = VideoRecord::dry_run("clip", "dry_run_playlist_a", "/v/a/clip.mp4");
        ledger.upsert_video(&dry).await.unwrap();
        let real = VideoRecord::new("vid1", "clip", "PL1", "/v/a/clip.mp4");
        ledger.upsert_video(&real).await.unwrap();
        ledger.upsert_video(&real).await.unwrap();

        assert_eq!(ledger.find_video("/v/a/clip.mp4").await.unwrap(), Some(real));
        assert_eq!(ledger.list_videos().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_playlist_replaces_by_name() {
        let ledger = SqliteLedger::in_memory().await.unwrap();

        ledger
            .upsert_playlist(&PlaylistRecord::new("PL1", "trip"))
            .await
            .unwrap();
        ledger
            .upsert_playlist(&PlaylistRecord::new("PL2", "trip"))
            .await
            .unwrap();

        let found = ledger.find_playlist("trip").await.unwrap().unwrap();
        assert_eq!(found.id, "PL2");
        assert_eq!(ledger.list_playlists().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_dry_run_video() {
        let ledger = SqliteLedger::in_memory().await.unwrap();
        let record = ledger
            .record_dry_run_video("clip", "dry_run_playlist_a", "/v/a/clip.mp4")
            .await
            .unwrap();

        assert!(record.is_dry_run());
        assert_eq!(
            ledger.find_video("/v/a/clip.mp4").await.unwrap(),
            Some(record)
        );
    }
}
