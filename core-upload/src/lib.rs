//! # Core Upload
//!
//! Turns a directory tree into playlists of uploaded videos.
//!
//! ## Overview
//!
//! - [`scanner`] maps each subdirectory to a playlist name
//! - [`resolver`] finds or creates the playlist behind each name
//! - [`uploader`] moves one file through the resumable protocol
//! - [`orchestrator`] runs the batch, owns pause/cancel and reports events
//!
//! Every completed upload and every resolved playlist is written to the
//! [`core_ledger::Ledger`] before the next step starts, so an interrupted run
//! can be restarted and only the remaining files are sent.
//!
//! ## Failure handling
//!
//! Remote failures are sorted by [`retry::classify`]:
//!
//! - quota exhaustion stops the batch
//! - transient failures are retried with exponential backoff
//! - anything else fails the current file and the batch moves on
//!
//! ## Example
//!
//! ```ignore
//! use core_upload::{RunControl, UploadOrchestrator};
//!
//! let orchestrator = UploadOrchestrator::new(config, ledger, Some(service), events, control, clock)?;
//! let summary = orchestrator.run().await?;
//! println!("{} uploaded, {} skipped", summary.uploaded, summary.skipped);
//! ```

pub mod control;
pub mod error;
pub mod orchestrator;
pub mod resolver;
pub mod retry;
pub mod scanner;
pub mod uploader;

pub use control::RunControl;
pub use error::{Result, UploadError};
pub use orchestrator::{FileFailure, RunSummary, UploadOrchestrator};
pub use resolver::PlaylistResolver;
pub use retry::{classify, BackoffPolicy, FailureKind};
pub use scanner::{playlist_name, scan_directory, PlaylistBatch};
pub use uploader::{UploadOutcome, VideoUploader};
