//! # Upload Orchestrator
//!
//! Runs one batch: pre-scan, then for every directory resolve its playlist
//! and upload its files one at a time. Pause and cancel are honored at file
//! boundaries only.
//!
//! ## Events
//!
//! ```text
//! RunEvent::Started
//!   Status("Uploading to <playlist>")
//!   PlaylistEvent::Resolved
//!     UploadEvent::Started
//!     UploadEvent::Progress*          (forwarded from the uploader)
//!     UploadEvent::Completed | Failed
//!     RunEvent::Progress
//! RunEvent::Completed | Cancelled | Failed
//! ```

use bridge_traits::time::Clock;
use bridge_traits::video::VideoHostingService;
use core_ledger::Ledger;
use core_runtime::config::{FailurePolicy, UploaderConfig};
use core_runtime::events::{CoreEvent, EventBus, RunEvent, UploadEvent};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use crate::control::RunControl;
use crate::error::{Result, UploadError};
use crate::resolver::PlaylistResolver;
use crate::retry::BackoffPolicy;
use crate::scanner::{scan_directory, PlaylistBatch};
use crate::uploader::{ledger_key, title_for, VideoUploader};

/// A file that could not be uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub file_path: String,
    pub message: String,
}

/// Outcome of a run that was not stopped by a batch-fatal error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub total_files: u64,
    pub uploaded: u64,
    /// Files the ledger already held
    pub skipped: u64,
    pub failed: u64,
    pub cancelled: bool,
    pub failures: Vec<FileFailure>,
}

impl RunSummary {
    fn new(run_id: String, total_files: u64) -> Self {
        Self {
            run_id,
            total_files,
            uploaded: 0,
            skipped: 0,
            failed: 0,
            cancelled: false,
            failures: Vec::new(),
        }
    }

    pub fn processed(&self) -> u64 {
        self.uploaded + self.skipped + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

enum Checkpoint {
    Continue,
    Cancelled,
}

enum Flow {
    Finished,
    Cancelled,
}

pub struct UploadOrchestrator {
    config: UploaderConfig,
    resolver: PlaylistResolver,
    uploader: VideoUploader,
    events: EventBus,
    control: Arc<RunControl>,
    clock: Arc<dyn Clock>,
}

impl UploadOrchestrator {
    /// Build an orchestrator for `config`.
    ///
    /// Preview runs never use `service`; upload runs require it.
    ///
    /// # Errors
    ///
    /// - [`UploadError::Config`] if the configuration does not validate
    /// - [`UploadError::CapabilityMissing`] in upload mode without a service
    pub fn new(
        config: UploaderConfig,
        ledger: Arc<dyn Ledger>,
        service: Option<Arc<dyn VideoHostingService>>,
        events: EventBus,
        control: Arc<RunControl>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let service = if config.mode.is_preview() {
            None
        } else {
            Some(service.ok_or_else(|| {
                UploadError::CapabilityMissing(
                    "a video hosting service is required to upload".into(),
                )
            })?)
        };

        let backoff = BackoffPolicy::from(&config.transfer);

        let resolver = PlaylistResolver::new(
            ledger.clone(),
            service.clone(),
            config.mode,
            config.playlist_privacy,
            backoff,
            clock.clone(),
            events.clone(),
        );

        let uploader = VideoUploader::new(
            ledger,
            service,
            clock.clone(),
            events.clone(),
            config.mode,
            config.transfer.chunk_size_bytes,
            backoff,
            config.video_defaults.clone(),
            config.preview.clone(),
        );

        Ok(Self {
            config,
            resolver,
            uploader,
            events,
            control,
            clock,
        })
    }

    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    /// Run the batch on a Tokio task
    pub fn spawn(self) -> JoinHandle<Result<RunSummary>> {
        tokio::spawn(async move { self.run().await })
    }

    /// Run the batch to completion, cancellation or a batch-fatal error.
    ///
    /// File-level failures are counted in the summary and the run moves on,
    /// unless the configured [`FailurePolicy`] is `Abort`.
    ///
    /// # Errors
    ///
    /// Batch-fatal errors ([`UploadError::is_batch_fatal`]), an unreadable
    /// root directory, and the first file failure under `FailurePolicy::Abort`.
    #[instrument(skip(self), fields(root = %self.config.root_dir.display(), preview = self.config.mode.is_preview()))]
    pub async fn run(&self) -> Result<RunSummary> {
        let started_at = self.clock.now();
        let run_id = Uuid::new_v4().to_string();

        let batches = scan_directory(&self.config.root_dir, &self.config.video_extensions)?;
        let total_files: u64 = batches.iter().map(|b| b.files.len() as u64).sum();

        info!(%run_id, total_files, playlists = batches.len(), "Starting upload run");
        self.events
            .emit(CoreEvent::Run(RunEvent::Started {
                run_id: run_id.clone(),
                root: self.config.root_dir.display().to_string(),
                total_files,
                playlists: batches.len() as u64,
                preview: self.config.mode.is_preview(),
            }))
            .ok();

        let mut summary = RunSummary::new(run_id.clone(), total_files);

        match self.process(&batches, &mut summary).await {
            Ok(Flow::Finished) => {
                let duration_secs = (self.clock.now() - started_at).num_seconds().max(0) as u64;
                info!(
                    uploaded = summary.uploaded,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    duration_secs,
                    "Upload run completed"
                );
                self.events
                    .emit(CoreEvent::Run(RunEvent::Completed {
                        run_id,
                        uploaded: summary.uploaded,
                        skipped: summary.skipped,
                        failed: summary.failed,
                        duration_secs,
                    }))
                    .ok();
                let message = if self.config.mode.is_preview() {
                    "Dry run completed!"
                } else {
                    "Upload completed!"
                };
                self.status(message);
                Ok(summary)
            }
            Ok(Flow::Cancelled) => {
                summary.cancelled = true;
                info!(processed = summary.processed(), "Upload run cancelled");
                self.events
                    .emit(CoreEvent::Run(RunEvent::Cancelled {
                        run_id,
                        processed: summary.processed(),
                    }))
                    .ok();
                self.status("Upload cancelled.");
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, processed = summary.processed(), "Upload run stopped");
                self.events
                    .emit(CoreEvent::Run(RunEvent::Failed {
                        run_id,
                        message: e.to_string(),
                        processed: summary.processed(),
                    }))
                    .ok();
                if matches!(e, UploadError::QuotaExceeded(_)) {
                    self.status("Upload process stopped due to exceeded quota.");
                }
                Err(e)
            }
        }
    }

    async fn process(&self, batches: &[PlaylistBatch], summary: &mut RunSummary) -> Result<Flow> {
        for batch in batches {
            if let Checkpoint::Cancelled = self.checkpoint(&summary.run_id).await {
                return Ok(Flow::Cancelled);
            }

            let span = info_span!("playlist", name = %batch.name);
            let flow = self
                .process_batch(batch, summary)
                .instrument(span)
                .await?;
            if let Flow::Cancelled = flow {
                return Ok(Flow::Cancelled);
            }
        }
        Ok(Flow::Finished)
    }

    async fn process_batch(&self, batch: &PlaylistBatch, summary: &mut RunSummary) -> Result<Flow> {
        self.status(format!("Uploading to {}", batch.name));

        let playlist_id = match self.resolver.resolve(&batch.name).await {
            Ok(id) => id,
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => {
                warn!(error = %e, files = batch.files.len(), "Playlist unavailable, skipping directory");
                for file in &batch.files {
                    self.record_failure(summary, file, &e);
                    self.emit_run_progress(summary);
                }
                self.status(format!("Could not prepare playlist {}: {}", batch.name, e));
                return match self.config.failure_policy {
                    FailurePolicy::Abort => Err(e),
                    FailurePolicy::Continue => Ok(Flow::Finished),
                };
            }
        };

        for file in &batch.files {
            if let Checkpoint::Cancelled = self.checkpoint(&summary.run_id).await {
                return Ok(Flow::Cancelled);
            }

            self.emit(UploadEvent::Started {
                playlist: batch.name.clone(),
                playlist_id: playlist_id.clone(),
                file_path: ledger_key(file),
                title: title_for(file),
            });

            match self.uploader.upload(file, &playlist_id).await {
                Ok(outcome) => {
                    if outcome.already_uploaded {
                        summary.skipped += 1;
                    } else {
                        summary.uploaded += 1;
                    }
                    self.emit(UploadEvent::Completed {
                        playlist_id: playlist_id.clone(),
                        file_path: outcome.record.file_path,
                        video_id: outcome.record.id,
                        already_uploaded: outcome.already_uploaded,
                    });
                }
                Err(e) if e.is_batch_fatal() => {
                    self.emit(UploadEvent::Failed {
                        file_path: ledger_key(file),
                        message: e.to_string(),
                        batch_fatal: true,
                    });
                    return Err(e);
                }
                Err(e) => {
                    self.record_failure(summary, file, &e);
                    self.status(format!("Failed to upload {}: {}", title_for(file), e));
                    if self.config.failure_policy == FailurePolicy::Abort {
                        self.emit_run_progress(summary);
                        return Err(e);
                    }
                }
            }

            self.emit_run_progress(summary);
        }

        Ok(Flow::Finished)
    }

    /// File-boundary check of the pause and cancel flags
    async fn checkpoint(&self, run_id: &str) -> Checkpoint {
        if self.control.is_cancelled() {
            return Checkpoint::Cancelled;
        }

        if self.control.is_paused() {
            info!("Run paused");
            self.events
                .emit(CoreEvent::Run(RunEvent::Paused {
                    run_id: run_id.to_string(),
                }))
                .ok();

            if !self
                .control
                .wait_while_paused(self.config.pause_poll_interval)
                .await
            {
                return Checkpoint::Cancelled;
            }

            info!("Run resumed");
            self.events
                .emit(CoreEvent::Run(RunEvent::Resumed {
                    run_id: run_id.to_string(),
                }))
                .ok();
        }

        Checkpoint::Continue
    }

    fn record_failure(&self, summary: &mut RunSummary, file: &Path, error: &UploadError) {
        warn!(file = %file.display(), error = %error, "File failed");
        summary.failed += 1;
        summary.failures.push(FileFailure {
            file_path: ledger_key(file),
            message: error.to_string(),
        });
        self.emit(UploadEvent::Failed {
            file_path: ledger_key(file),
            message: error.to_string(),
            batch_fatal: false,
        });
    }

    fn emit_run_progress(&self, summary: &RunSummary) {
        let processed = summary.processed();
        let percent = if summary.total_files == 0 {
            100
        } else {
            (processed * 100 / summary.total_files).min(100) as u8
        };
        self.events
            .emit(CoreEvent::Run(RunEvent::Progress {
                run_id: summary.run_id.clone(),
                processed,
                total: summary.total_files,
                percent,
            }))
            .ok();
    }

    fn emit(&self, event: UploadEvent) {
        self.events.emit(CoreEvent::Upload(event)).ok();
    }

    fn status(&self, message: impl Into<String>) {
        self.events.emit(CoreEvent::status(message)).ok();
    }
}
