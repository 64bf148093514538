//! Playlist resolution
//!
//! Name to playlist id, in this order: ledger, then (preview only) a
//! synthesized id, then the account's existing playlists, then a newly
//! created one. Every result that did not come from the ledger is written
//! back so later runs never list or create again.

use bridge_traits::error::BridgeError;
use bridge_traits::time::Clock;
use bridge_traits::video::{PrivacyStatus, VideoHostingService};
use core_ledger::{Ledger, PlaylistRecord};
use core_runtime::config::RunMode;
use core_runtime::events::{CoreEvent, EventBus, PlaylistEvent, PlaylistSource};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, UploadError};
use crate::retry::{classify, into_upload_error, BackoffPolicy, FailureKind};

pub struct PlaylistResolver {
    ledger: Arc<dyn Ledger>,
    service: Option<Arc<dyn VideoHostingService>>,
    mode: RunMode,
    privacy: PrivacyStatus,
    backoff: BackoffPolicy,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl PlaylistResolver {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        service: Option<Arc<dyn VideoHostingService>>,
        mode: RunMode,
        privacy: PrivacyStatus,
        backoff: BackoffPolicy,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Self {
        Self {
            ledger,
            service,
            mode,
            privacy,
            backoff,
            clock,
            events,
        }
    }

    /// Resolve `name` to a playlist id.
    ///
    /// # Errors
    ///
    /// - [`UploadError::LedgerUnavailable`] if the ledger cannot be read or written
    /// - [`UploadError::CapabilityMissing`] in upload mode without a service
    /// - the classified remote failure once retries are exhausted
    #[instrument(skip(self))]
    pub async fn resolve(&self, name: &str) -> Result<String> {
        if let Some(record) = self.ledger.find_playlist(name).await? {
            if self.mode.is_preview() || !record.is_dry_run() {
                debug!(playlist_id = %record.id, "Playlist found in ledger");
                self.emit(name, &record.id, PlaylistSource::Ledger);
                return Ok(record.id);
            }
            debug!("Replacing preview playlist record");
        }

        if self.mode.is_preview() {
            let record = PlaylistRecord::dry_run(name);
            self.ledger.upsert_playlist(&record).await?;
            self.emit(name, &record.id, PlaylistSource::Preview);
            return Ok(record.id);
        }

        let service = self.service.as_ref().ok_or_else(|| {
            UploadError::CapabilityMissing("a video hosting service is required to upload".into())
        })?;

        let mut attempt = 1;
        let (playlist_id, source) = loop {
            match self.find_or_create(service.as_ref(), name).await {
                Ok(found) => break found,
                Err(error) => match (classify(&error), self.backoff.delay_after(attempt)) {
                    (FailureKind::Transient, Some(delay)) => {
                        warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Playlist lookup failed, retrying"
                        );
                        self.clock.sleep(delay).await;
                        attempt += 1;
                    }
                    _ => return Err(into_upload_error(error, attempt)),
                },
            }
        };

        self.ledger
            .upsert_playlist(&PlaylistRecord::new(&playlist_id, name))
            .await?;
        self.emit(name, &playlist_id, source);
        Ok(playlist_id)
    }

    /// Remote half of the resolution. Retried as a whole, so a create whose
    /// response was lost is found by the next listing.
    async fn find_or_create(
        &self,
        service: &dyn VideoHostingService,
        name: &str,
    ) -> std::result::Result<(String, PlaylistSource), BridgeError> {
        let existing = service.list_playlists().await?;
        if let Some(playlist) = existing.into_iter().find(|p| p.title == name) {
            debug!(playlist_id = %playlist.id, "Reusing existing playlist");
            return Ok((playlist.id, PlaylistSource::Remote));
        }

        let created = service.create_playlist(name, self.privacy).await?;
        info!(playlist_id = %created.id, privacy = %self.privacy, "Created playlist");
        Ok((created.id, PlaylistSource::Created))
    }

    fn emit(&self, name: &str, playlist_id: &str, source: PlaylistSource) {
        self.events
            .emit(CoreEvent::Playlist(PlaylistEvent::Resolved {
                name: name.to_string(),
                playlist_id: playlist_id.to_string(),
                source,
            }))
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockVideoService, RecordingClock};
    use bridge_traits::video::RemotePlaylist;
    use core_ledger::SqliteLedger;
    use std::time::Duration;

    async fn resolver(
        service: Option<MockVideoService>,
        mode: RunMode,
    ) -> (PlaylistResolver, Arc<dyn Ledger>, Arc<RecordingClock>) {
        let ledger: Arc<dyn Ledger> = Arc::new(SqliteLedger::in_memory().await.unwrap());
        let clock = Arc::new(RecordingClock::default());
        let resolver = PlaylistResolver::new(
            ledger.clone(),
            service.map(|s| Arc::new(s) as Arc<dyn VideoHostingService>),
            mode,
            PrivacyStatus::Private,
            BackoffPolicy::default(),
            clock.clone(),
            EventBus::new(16),
        );
        (resolver, ledger, clock)
    }

    fn playlist(id: &str, title: &str) -> RemotePlaylist {
        RemotePlaylist {
            id: id.to_string(),
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn test_ledger_hit_makes_no_remote_call() {
        let mut service = MockVideoService::new();
        service.expect_list_playlists().times(0);
        service.expect_create_playlist().times(0);

        let (resolver, ledger, _) = resolver(Some(service), RunMode::Upload).await;
        ledger
            .upsert_playlist(&PlaylistRecord::new("PL1", "trip"))
            .await
            .unwrap();

        assert_eq!(resolver.resolve("trip").await.unwrap(), "PL1");
    }

    #[tokio::test]
    async fn test_existing_remote_playlist_is_reused_and_recorded() {
        let mut service = MockVideoService::new();
        service
            .expect_list_playlists()
            .times(1)
            .returning(|| Ok(vec![playlist("PLx", "other"), playlist("PL7", "trip")]));
        service.expect_create_playlist().times(0);

        let (resolver, ledger, _) = resolver(Some(service), RunMode::Upload).await;

        assert_eq!(resolver.resolve("trip").await.unwrap(), "PL7");
        assert_eq!(ledger.find_playlist("trip").await.unwrap().unwrap().id, "PL7");
    }

    #[tokio::test]
    async fn test_missing_playlist_is_created_private() {
        let mut service = MockVideoService::new();
        service.expect_list_playlists().times(1).returning(|| Ok(vec![]));
        service
            .expect_create_playlist()
            .withf(|title, privacy| title == "trip_day1" && *privacy == PrivacyStatus::Private)
            .times(1)
            .returning(|title, _| Ok(playlist("PLnew", title)));

        let (resolver, ledger, _) = resolver(Some(service), RunMode::Upload).await;

        assert_eq!(resolver.resolve("trip_day1").await.unwrap(), "PLnew");
        // Memoized: a second resolution is served from the ledger.
        assert_eq!(resolver.resolve("trip_day1").await.unwrap(), "PLnew");
        assert_eq!(ledger.list_playlists().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_preview_synthesizes_id_without_service() {
        let (resolver, ledger, _) = resolver(None, RunMode::Preview).await;

        let id = resolver.resolve("trip").await.unwrap();
        assert_eq!(id, "dry_run_playlist_trip");
        assert!(ledger.find_playlist("trip").await.unwrap().unwrap().is_dry_run());
    }

    #[tokio::test]
    async fn test_preview_record_is_replaced_in_upload_mode() {
        let mut service = MockVideoService::new();
        service.expect_list_playlists().times(1).returning(|| Ok(vec![]));
        service
            .expect_create_playlist()
            .times(1)
            .returning(|title, _| Ok(playlist("PLreal", title)));

        let (resolver, ledger, _) = resolver(Some(service), RunMode::Upload).await;
        ledger
            .upsert_playlist(&PlaylistRecord::dry_run("trip"))
            .await
            .unwrap();

        assert_eq!(resolver.resolve("trip").await.unwrap(), "PLreal");
        assert_eq!(ledger.find_playlist("trip").await.unwrap().unwrap().id, "PLreal");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried_with_backoff() {
        let mut service = MockVideoService::new();
        let mut seq = mockall::Sequence::new();
        service
            .expect_list_playlists()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Err(BridgeError::Network("connection reset".into())));
        service
            .expect_list_playlists()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![playlist("PL1", "trip")]));

        let (resolver, _, clock) = resolver(Some(service), RunMode::Upload).await;

        assert_eq!(resolver.resolve("trip").await.unwrap(), "PL1");
        assert_eq!(
            clock.sleeps(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_quota_is_not_retried() {
        let mut service = MockVideoService::new();
        service.expect_list_playlists().times(1).returning(|| {
            Err(BridgeError::Remote {
                status: 403,
                reason: Some("quotaExceeded".into()),
                message: "quota".into(),
            })
        });

        let (resolver, ledger, clock) = resolver(Some(service), RunMode::Upload).await;

        let err = resolver.resolve("trip").await.unwrap_err();
        assert!(matches!(err, UploadError::QuotaExceeded(_)));
        assert!(clock.sleeps().is_empty());
        assert!(ledger.find_playlist("trip").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_mode_without_service() {
        let (resolver, _, _) = resolver(None, RunMode::Upload).await;
        assert!(matches!(
            resolver.resolve("trip").await,
            Err(UploadError::CapabilityMissing(_))
        ));
    }
}
