//! # Upload State Machine
//!
//! Drives one local file to a recorded remote video:
//!
//! ```text
//! CheckLedger ──hit──────────────────────────────────────────────► Done
//!      │ miss
//!      ├─ preview ─► Simulate ──────────────────────────► Record ─► Done
//!      ▼
//!   Prepare ─► Transferring ⇄ TransferRetryWait
//!                  │ complete
//!                  ▼
//!              Attaching ⇄ AttachRetryWait
//!                  │ attached
//!                  ▼
//!               Record ─► Done
//! ```
//!
//! Each transfer attempt ends in a typed [`AttemptOutcome`]; the loop in
//! [`VideoUploader::upload`] decides the next state from it. A failed
//! attachment is retried on its own and never re-uploads the video.

use bridge_traits::error::BridgeError;
use bridge_traits::time::Clock;
use bridge_traits::video::{
    ChunkStatus, RemoteVideo, UploadSession, VideoHostingService, VideoMetadata,
};
use bytes::Bytes;
use core_ledger::{Ledger, VideoRecord};
use core_runtime::config::{PreviewSettings, RunMode, VideoDefaults};
use core_runtime::events::{CoreEvent, EventBus, UploadEvent};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, UploadError};
use crate::retry::{classify, into_upload_error, BackoffPolicy, FailureKind};

/// Content type announced for a file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("mp4") => "video/mp4",
        Some("avi") => "video/x-msvideo",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("m4v") => "video/x-m4v",
        _ => "application/octet-stream",
    }
}

/// Video title derived from the file name (the stem)
pub fn title_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Ledger key of a local file
pub fn ledger_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Result of [`VideoUploader::upload`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub record: VideoRecord,
    /// The ledger already held this file; nothing was sent
    pub already_uploaded: bool,
}

/// How a single transfer attempt ended
#[derive(Debug)]
pub enum AttemptOutcome {
    Completed(RemoteVideo),
    Failed {
        error: BridgeError,
        /// Session to resume on the next attempt, if one was opened
        session: Option<UploadSession>,
    },
}

#[derive(Debug)]
enum UploadState {
    CheckLedger,
    Simulate,
    Prepare,
    Transferring {
        attempt: u32,
        session: Option<UploadSession>,
    },
    TransferRetryWait {
        attempt: u32,
        delay: Duration,
        session: Option<UploadSession>,
        message: String,
    },
    Attaching {
        video: RemoteVideo,
        attempt: u32,
    },
    AttachRetryWait {
        video: RemoteVideo,
        attempt: u32,
        delay: Duration,
        message: String,
    },
    Record(VideoRecord),
    Done(UploadOutcome),
}

impl UploadState {
    fn name(&self) -> &'static str {
        match self {
            UploadState::CheckLedger => "check_ledger",
            UploadState::Simulate => "simulate",
            UploadState::Prepare => "prepare",
            UploadState::Transferring { .. } => "transferring",
            UploadState::TransferRetryWait { .. } => "transfer_retry_wait",
            UploadState::Attaching { .. } => "attaching",
            UploadState::AttachRetryWait { .. } => "attach_retry_wait",
            UploadState::Record(_) => "record",
            UploadState::Done(_) => "done",
        }
    }
}

/// An open local file plus what the service needs to know about it
struct LocalVideo {
    path: PathBuf,
    file: File,
    total_bytes: u64,
    content_type: &'static str,
    metadata: VideoMetadata,
}

impl LocalVideo {
    async fn open(path: &Path, metadata: VideoMetadata) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|e| UploadError::local_io(path, e))?;
        let total_bytes = file
            .metadata()
            .await
            .map_err(|e| UploadError::local_io(path, e))?
            .len();

        if total_bytes == 0 {
            return Err(UploadError::local_io(path, "file is empty"));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            total_bytes,
            content_type: content_type_for(path),
            metadata,
        })
    }

    async fn read_chunk(&mut self, offset: u64, max_len: usize) -> Result<Bytes> {
        let remaining = self.total_bytes.saturating_sub(offset);
        let len = remaining.min(max_len as u64) as usize;
        let mut buffer = vec![0u8; len];

        self.file
            .seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| UploadError::local_io(&self.path, e))?;
        self.file
            .read_exact(&mut buffer)
            .await
            .map_err(|e| UploadError::local_io(&self.path, e))?;

        Ok(Bytes::from(buffer))
    }
}

/// Uploads single files; one instance serves a whole run.
pub struct VideoUploader {
    ledger: Arc<dyn Ledger>,
    service: Option<Arc<dyn VideoHostingService>>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    mode: RunMode,
    chunk_size: usize,
    backoff: BackoffPolicy,
    defaults: VideoDefaults,
    preview: PreviewSettings,
}

impl VideoUploader {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ledger: Arc<dyn Ledger>,
        service: Option<Arc<dyn VideoHostingService>>,
        clock: Arc<dyn Clock>,
        events: EventBus,
        mode: RunMode,
        chunk_size: usize,
        backoff: BackoffPolicy,
        defaults: VideoDefaults,
        preview: PreviewSettings,
    ) -> Self {
        Self {
            ledger,
            service,
            clock,
            events,
            mode,
            chunk_size: chunk_size.max(1),
            backoff,
            defaults,
            preview,
        }
    }

    /// Upload `path` into `playlist_id`, or return the stored record.
    ///
    /// # Errors
    ///
    /// - [`UploadError::QuotaExceeded`] (batch-fatal)
    /// - [`UploadError::RetriesExhausted`] after the last transient failure
    /// - [`UploadError::PermanentRemote`] on any other rejection
    /// - [`UploadError::AttachmentFailed`] when the video exists but could
    ///   not be added to the playlist
    /// - [`UploadError::LocalIo`] for empty or unreadable files
    /// - [`UploadError::LedgerUnavailable`] / [`UploadError::Credentials`]
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn upload(&self, path: &Path, playlist_id: &str) -> Result<UploadOutcome> {
        let key = ledger_key(path);
        let title = title_for(path);
        let mut local: Option<LocalVideo> = None;
        let mut state = UploadState::CheckLedger;

        loop {
            debug!(state = state.name(), "Upload state");

            state = match state {
                UploadState::CheckLedger => match self.ledger.find_video(&key).await? {
                    Some(record) if self.mode.is_preview() || !record.is_dry_run() => {
                        info!(video_id = %record.id, "Already uploaded, skipping");
                        UploadState::Done(UploadOutcome {
                            record,
                            already_uploaded: true,
                        })
                    }
                    found => {
                        if found.is_some() {
                            debug!("Replacing preview record with a real upload");
                        }
                        if self.mode.is_preview() {
                            UploadState::Simulate
                        } else {
                            UploadState::Prepare
                        }
                    }
                },

                UploadState::Simulate => {
                    self.simulate_progress(path, playlist_id).await;
                    let record = self
                        .ledger
                        .record_dry_run_video(&title, playlist_id, &key)
                        .await?;
                    UploadState::Done(UploadOutcome {
                        record,
                        already_uploaded: false,
                    })
                }

                UploadState::Prepare => {
                    self.service()?;
                    local = Some(LocalVideo::open(path, self.metadata(&title)).await?);
                    UploadState::Transferring {
                        attempt: 1,
                        session: None,
                    }
                }

                UploadState::Transferring { attempt, session } => {
                    let video = local
                        .as_mut()
                        .ok_or_else(|| UploadError::local_io(path, "file was not opened"))?;

                    match self.transfer_attempt(video, playlist_id, session).await? {
                        AttemptOutcome::Completed(remote) => {
                            info!(video_id = %remote.id, attempt, "Transfer complete");
                            UploadState::Attaching {
                                video: remote,
                                attempt: 1,
                            }
                        }
                        AttemptOutcome::Failed { error, session } => {
                            match (classify(&error), self.backoff.delay_after(attempt)) {
                                (FailureKind::Transient, Some(delay)) => {
                                    UploadState::TransferRetryWait {
                                        attempt,
                                        delay,
                                        session,
                                        message: error.to_string(),
                                    }
                                }
                                _ => {
                                    error!(attempt, error = %error, "Transfer failed");
                                    return Err(into_upload_error(error, attempt));
                                }
                            }
                        }
                    }
                }

                UploadState::TransferRetryWait {
                    attempt,
                    delay,
                    session,
                    message,
                } => {
                    self.wait_before_retry(&key, "transfer", attempt, delay, message)
                        .await;
                    UploadState::Transferring {
                        attempt: attempt + 1,
                        session,
                    }
                }

                UploadState::Attaching { video, attempt } => {
                    let service = self.service()?;
                    match service.add_to_playlist(playlist_id, &video.id).await {
                        Ok(()) => {
                            let stored_title = if video.title.is_empty() {
                                title.clone()
                            } else {
                                video.title.clone()
                            };
                            UploadState::Record(VideoRecord::new(
                                video.id,
                                stored_title,
                                playlist_id,
                                &key,
                            ))
                        }
                        Err(error) => match (classify(&error), self.backoff.delay_after(attempt)) {
                            (FailureKind::Transient, Some(delay)) => UploadState::AttachRetryWait {
                                video,
                                attempt,
                                delay,
                                message: error.to_string(),
                            },
                            (FailureKind::Quota, _) => {
                                warn!(video_id = %video.id, "Quota exhausted before the video was added to its playlist");
                                return Err(UploadError::QuotaExceeded(error.to_string()));
                            }
                            (FailureKind::Credentials, _) => {
                                return Err(UploadError::Credentials(error.to_string()));
                            }
                            _ => {
                                error!(video_id = %video.id, attempt, error = %error, "Attachment failed");
                                return Err(UploadError::AttachmentFailed {
                                    video_id: video.id,
                                    playlist_id: playlist_id.to_string(),
                                    message: error.to_string(),
                                });
                            }
                        },
                    }
                }

                UploadState::AttachRetryWait {
                    video,
                    attempt,
                    delay,
                    message,
                } => {
                    self.wait_before_retry(&key, "attach", attempt, delay, message)
                        .await;
                    UploadState::Attaching {
                        video,
                        attempt: attempt + 1,
                    }
                }

                UploadState::Record(record) => {
                    self.ledger.upsert_video(&record).await?;
                    UploadState::Done(UploadOutcome {
                        record,
                        already_uploaded: false,
                    })
                }

                UploadState::Done(outcome) => return Ok(outcome),
            };
        }
    }

    fn service(&self) -> Result<&Arc<dyn VideoHostingService>> {
        self.service.as_ref().ok_or_else(|| {
            UploadError::CapabilityMissing("a video hosting service is required to upload".into())
        })
    }

    fn metadata(&self, title: &str) -> VideoMetadata {
        VideoMetadata {
            title: title.to_string(),
            description: self.defaults.description.clone(),
            tags: self.defaults.tags.clone(),
            category_id: self.defaults.category_id.clone(),
            privacy: self.defaults.privacy,
        }
    }

    /// One pass of the resumable protocol.
    ///
    /// With a session from an earlier attempt the server is asked how much it
    /// holds and the transfer continues from there; an expired session
    /// (404/410) is replaced by a fresh one. Local read errors abort the file.
    async fn transfer_attempt(
        &self,
        video: &mut LocalVideo,
        playlist_id: &str,
        session: Option<UploadSession>,
    ) -> Result<AttemptOutcome> {
        let service = self.service()?;
        let total = video.total_bytes;

        let resumed = match session {
            Some(session) => match service.query_upload(&session).await {
                Ok(ChunkStatus::Complete(remote)) => return Ok(AttemptOutcome::Completed(remote)),
                Ok(ChunkStatus::Incomplete { bytes_received }) => {
                    debug!(bytes_received, "Resuming upload session");
                    Some((session, bytes_received))
                }
                Err(error) if matches!(error.status(), Some(404) | Some(410)) => {
                    warn!("Upload session expired, starting over");
                    None
                }
                Err(error) => {
                    return Ok(AttemptOutcome::Failed {
                        error,
                        session: Some(session),
                    })
                }
            },
            None => None,
        };

        let (session, mut offset) = match resumed {
            Some(resumed) => resumed,
            None => match service
                .begin_upload(&video.metadata, total, video.content_type)
                .await
            {
                Ok(session) => (session, 0),
                Err(error) => return Ok(AttemptOutcome::Failed { error, session: None }),
            },
        };

        loop {
            let status = if offset >= total {
                service.query_upload(&session).await
            } else {
                let chunk = video.read_chunk(offset, self.chunk_size).await?;
                service.upload_chunk(&session, offset, chunk).await
            };

            match status {
                Ok(ChunkStatus::Complete(remote)) => {
                    self.emit_progress(playlist_id, &video.path, total, total);
                    return Ok(AttemptOutcome::Completed(remote));
                }
                Ok(ChunkStatus::Incomplete { bytes_received }) if bytes_received > offset => {
                    offset = bytes_received.min(total);
                    self.emit_progress(playlist_id, &video.path, offset, total);
                }
                Ok(ChunkStatus::Incomplete { bytes_received }) => {
                    return Ok(AttemptOutcome::Failed {
                        error: BridgeError::Network(format!(
                            "upload stalled at byte {} of {}",
                            bytes_received, total
                        )),
                        session: Some(session),
                    });
                }
                Err(error) => {
                    return Ok(AttemptOutcome::Failed {
                        error,
                        session: Some(session),
                    })
                }
            }
        }
    }

    async fn wait_before_retry(
        &self,
        file_path: &str,
        phase: &str,
        attempt: u32,
        delay: Duration,
        message: String,
    ) {
        warn!(
            phase,
            attempt,
            max_attempts = self.backoff.max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %message,
            "Retrying after transient failure"
        );
        self.events
            .emit(CoreEvent::Upload(UploadEvent::RetryScheduled {
                file_path: file_path.to_string(),
                phase: phase.to_string(),
                attempt,
                delay_ms: delay.as_millis() as u64,
                message,
            }))
            .ok();
        self.clock.sleep(delay).await;
    }

    /// Preview stand-in for the transfer: progress events only
    async fn simulate_progress(&self, path: &Path, playlist_id: &str) {
        let steps = self.preview.progress_steps;
        if steps == 0 {
            return;
        }
        let total = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);

        for step in 1..=steps {
            if !self.preview.step_delay.is_zero() {
                self.clock.sleep(self.preview.step_delay).await;
            }
            let sent = total * u64::from(step) / u64::from(steps);
            let percent = (u64::from(step) * 100 / u64::from(steps)) as u8;
            self.emit(UploadEvent::Progress {
                playlist_id: playlist_id.to_string(),
                file_path: ledger_key(path),
                percent,
                remaining_bytes: total - sent,
            });
        }
    }

    fn emit_progress(&self, playlist_id: &str, path: &Path, sent: u64, total: u64) {
        let percent = if total == 0 {
            100
        } else {
            (sent.saturating_mul(100) / total).min(100) as u8
        };
        self.emit(UploadEvent::Progress {
            playlist_id: playlist_id.to_string(),
            file_path: ledger_key(path),
            percent,
            remaining_bytes: total.saturating_sub(sent),
        });
    }

    fn emit(&self, event: UploadEvent) {
        self.events.emit(CoreEvent::Upload(event)).ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockLedgerStore, MockVideoService, RecordingClock};
    use core_ledger::SqliteLedger;
    use core_runtime::config::TransferSettings;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const CHUNK: usize = 4;

    struct Harness {
        _dir: TempDir,
        path: PathBuf,
        ledger: Arc<dyn Ledger>,
        clock: Arc<RecordingClock>,
        events: EventBus,
    }

    async fn harness(contents: &[u8]) -> Harness {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("trip").join("clip.mp4");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();

        Harness {
            _dir: dir,
            path,
            ledger: Arc::new(SqliteLedger::in_memory().await.unwrap()),
            clock: Arc::new(RecordingClock::default()),
            events: EventBus::new(64),
        }
    }

    fn uploader(h: &Harness, service: Option<MockVideoService>, mode: RunMode) -> VideoUploader {
        VideoUploader::new(
            h.ledger.clone(),
            service.map(|s| Arc::new(s) as Arc<dyn VideoHostingService>),
            h.clock.clone(),
            h.events.clone(),
            mode,
            CHUNK,
            BackoffPolicy::from(&TransferSettings::default()),
            VideoDefaults::default(),
            PreviewSettings::default(),
        )
    }

    fn session() -> UploadSession {
        UploadSession {
            session_uri: "https://upload.example/s/1".to_string(),
            total_bytes: 10,
        }
    }

    fn complete(id: &str) -> ChunkStatus {
        ChunkStatus::Complete(RemoteVideo {
            id: id.to_string(),
            title: "clip".to_string(),
        })
    }

    fn transient() -> BridgeError {
        BridgeError::Remote {
            status: 503,
            reason: Some("backendError".into()),
            message: "unavailable".into(),
        }
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.MP4")), "video/mp4");
        assert_eq!(content_type_for(Path::new("a.avi")), "video/x-msvideo");
        assert_eq!(content_type_for(Path::new("a.mov")), "video/quicktime");
        assert_eq!(content_type_for(Path::new("a.mkv")), "video/x-matroska");
        assert_eq!(content_type_for(Path::new("a.m4v")), "video/x-m4v");
        assert_eq!(content_type_for(Path::new("a.webm")), "application/octet-stream");
        assert_eq!(title_for(Path::new("/v/trip/day one.mp4")), "day one");
    }

    #[tokio::test]
    async fn test_chunked_upload_attaches_and_records() {
        let h = harness(b"0123456789").await;
        let mut events = h.events.subscribe();

        let mut service = MockVideoService::new();
        service
            .expect_begin_upload()
            .withf(|metadata, total, content_type| {
                metadata.title == "clip" && *total == 10 && content_type == "video/mp4"
            })
            .times(1)
            .returning(|_, _, _| Ok(session()));
        service
            .expect_upload_chunk()
            .times(3)
            .returning(|_, offset, chunk| {
                let received = offset + chunk.len() as u64;
                if received >= 10 {
                    Ok(complete("vid1"))
                } else {
                    Ok(ChunkStatus::Incomplete {
                        bytes_received: received,
                    })
                }
            });
        service
            .expect_add_to_playlist()
            .withf(|playlist_id, video_id| playlist_id == "PL1" && video_id == "vid1")
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap();

        assert!(!outcome.already_uploaded);
        assert_eq!(outcome.record.id, "vid1");
        assert_eq!(outcome.record.playlist_id, "PL1");
        assert_eq!(
            h.ledger.find_video(&ledger_key(&h.path)).await.unwrap(),
            Some(outcome.record)
        );

        let mut percents = Vec::new();
        while let Ok(CoreEvent::Upload(UploadEvent::Progress { percent, .. })) = events.try_recv() {
            percents.push(percent);
        }
        assert_eq!(percents, vec![40, 80, 100]);
        assert!(h.clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_hit_makes_no_remote_call() {
        let h = harness(b"0123456789").await;
        let stored = VideoRecord::new("vid1", "clip", "PL1", ledger_key(&h.path));
        h.ledger.upsert_video(&stored).await.unwrap();

        let mut service = MockVideoService::new();
        service.expect_begin_upload().times(0);
        service.expect_add_to_playlist().times(0);

        let outcome = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap();
        assert!(outcome.already_uploaded);
        assert_eq!(outcome.record, stored);
    }

    #[tokio::test]
    async fn test_transient_failures_back_off_then_give_up() {
        let h = harness(b"0123456789").await;

        let mut service = MockVideoService::new();
        service
            .expect_begin_upload()
            .times(5)
            .returning(|_, _, _| Err(transient()));
        service.expect_add_to_playlist().times(0);

        let err = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::RetriesExhausted { attempts: 5, .. }));
        assert_eq!(
            h.clock.sleeps(),
            vec![
                Duration::from_secs(5),
                Duration::from_secs(10),
                Duration::from_secs(20),
                Duration::from_secs(40),
            ]
        );
        assert!(h.ledger.find_video(&ledger_key(&h.path)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_interrupted_transfer_resumes_from_server_offset() {
        let h = harness(b"0123456789").await;
        let calls = Arc::new(AtomicUsize::new(0));

        let mut service = MockVideoService::new();
        service
            .expect_begin_upload()
            .times(1)
            .returning(|_, _, _| Ok(session()));
        let counter = calls.clone();
        service
            .expect_upload_chunk()
            .returning(move |_, offset, chunk| {
                if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                    return Err(BridgeError::Network("connection reset".into()));
                }
                let received = offset + chunk.len() as u64;
                if received >= 10 {
                    Ok(complete("vid1"))
                } else {
                    Ok(ChunkStatus::Incomplete {
                        bytes_received: received,
                    })
                }
            });
        service
            .expect_query_upload()
            .times(1)
            .returning(|_| Ok(ChunkStatus::Incomplete { bytes_received: 4 }));
        service
            .expect_add_to_playlist()
            .times(1)
            .returning(|_, _| Ok(()));

        let outcome = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap();

        assert_eq!(outcome.record.id, "vid1");
        assert_eq!(h.clock.sleeps(), vec![Duration::from_secs(5)]);
        // chunk 0-3, failed 4-7, then 4-7 and 8-9 after resuming
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_quota_is_batch_fatal_without_retry() {
        let h = harness(b"0123456789").await;

        let mut service = MockVideoService::new();
        service.expect_begin_upload().times(1).returning(|_, _, _| {
            Err(BridgeError::Remote {
                status: 403,
                reason: Some("quotaExceeded".into()),
                message: "quota".into(),
            })
        });

        let err = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::QuotaExceeded(_)));
        assert!(err.is_batch_fatal());
        assert!(h.clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_error_fails_file() {
        let h = harness(b"0123456789").await;

        let mut service = MockVideoService::new();
        service.expect_begin_upload().times(1).returning(|_, _, _| {
            Err(BridgeError::Remote {
                status: 400,
                reason: Some("invalidTitle".into()),
                message: "bad title".into(),
            })
        });

        let err = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            UploadError::PermanentRemote {
                status: Some(400),
                ..
            }
        ));
        assert!(!err.is_batch_fatal());
    }

    #[tokio::test]
    async fn test_attachment_retry_never_reuploads() {
        let h = harness(b"0123").await;

        let mut service = MockVideoService::new();
        service
            .expect_begin_upload()
            .times(1)
            .returning(|_, _, _| Ok(session()));
        service
            .expect_upload_chunk()
            .times(1)
            .returning(|_, _, _| Ok(complete("vid1")));
        let mut seq = mockall::Sequence::new();
        service
            .expect_add_to_playlist()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(BridgeError::Network("reset".into())));
        service
            .expect_add_to_playlist()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let outcome = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap();

        assert_eq!(outcome.record.id, "vid1");
        assert_eq!(
            h.clock.sleeps(),
            vec![Duration::from_secs(5), Duration::from_secs(10)]
        );
    }

    #[tokio::test]
    async fn test_permanent_attachment_failure_reports_orphan() {
        let h = harness(b"0123").await;

        let mut service = MockVideoService::new();
        service
            .expect_begin_upload()
            .returning(|_, _, _| Ok(session()));
        service
            .expect_upload_chunk()
            .returning(|_, _, _| Ok(complete("vid1")));
        service.expect_add_to_playlist().times(1).returning(|_, _| {
            Err(BridgeError::Remote {
                status: 404,
                reason: Some("playlistNotFound".into()),
                message: "gone".into(),
            })
        });

        let err = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap_err();

        match err {
            UploadError::AttachmentFailed { video_id, .. } => assert_eq!(video_id, "vid1"),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(h.ledger.find_video(&ledger_key(&h.path)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_is_local_io() {
        let h = harness(b"").await;

        let mut service = MockVideoService::new();
        service.expect_begin_upload().times(0);

        let err = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::LocalIo { .. }));
    }

    #[tokio::test]
    async fn test_preview_records_synthesized_id() {
        let h = harness(b"0123456789").await;
        let mut events = h.events.subscribe();

        let outcome = uploader(&h, None, RunMode::Preview)
            .upload(&h.path, "dry_run_playlist_trip")
            .await
            .unwrap();

        assert_eq!(outcome.record.id, "dry_run_video_clip");
        assert!(outcome.record.is_dry_run());

        let mut progress_events = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, CoreEvent::Upload(UploadEvent::Progress { .. })) {
                progress_events += 1;
            }
        }
        assert_eq!(progress_events, PreviewSettings::default().progress_steps);
    }

    #[tokio::test]
    async fn test_preview_record_does_not_count_as_uploaded() {
        let h = harness(b"0123").await;
        h.ledger
            .record_dry_run_video("clip", "dry_run_playlist_trip", &ledger_key(&h.path))
            .await
            .unwrap();

        let mut service = MockVideoService::new();
        service
            .expect_begin_upload()
            .times(1)
            .returning(|_, _, _| Ok(session()));
        service
            .expect_upload_chunk()
            .returning(|_, _, _| Ok(complete("vid1")));
        service.expect_add_to_playlist().returning(|_, _| Ok(()));

        let outcome = uploader(&h, Some(service), RunMode::Upload)
            .upload(&h.path, "PL1")
            .await
            .unwrap();

        assert!(!outcome.already_uploaded);
        assert_eq!(outcome.record.id, "vid1");
    }

    #[tokio::test]
    async fn test_preview_goes_through_dry_run_recording() {
        let mut h = harness(b"0123456789").await;
        let key = ledger_key(&h.path);

        let mut ledger = MockLedgerStore::new();
        ledger.expect_find_video().times(1).returning(|_| Ok(None));
        ledger.expect_upsert_video().times(0);
        let expected_key = key.clone();
        ledger
            .expect_record_dry_run_video()
            .withf(move |title, playlist_id, file_path| {
                title == "clip" && playlist_id == "dry_run_playlist_trip" && file_path == expected_key
            })
            .times(1)
            .returning(|title, playlist_id, file_path| {
                Ok(VideoRecord::dry_run(title, playlist_id, file_path))
            });
        h.ledger = Arc::new(ledger);

        let outcome = uploader(&h, None, RunMode::Preview)
            .upload(&h.path, "dry_run_playlist_trip")
            .await
            .unwrap();

        assert_eq!(outcome.record.file_path, key);
        assert!(outcome.record.is_dry_run());
    }
}
