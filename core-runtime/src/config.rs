//! # Uploader Configuration Module
//!
//! Provides configuration management for the bulk uploader.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `UploaderConfig` instance that holds every setting the upload core needs.
//! It enforces fail-fast validation so that a bad chunk size or an empty
//! extension list is reported before any file is touched.
//!
//! ## Usage
//!
//! ### Basic Configuration
//!
//! ```
//! use core_runtime::config::UploaderConfig;
//!
//! let config = UploaderConfig::builder()
//!     .root_dir("/videos")
//!     .build()
//!     .expect("Failed to build config");
//! assert_eq!(config.transfer.max_attempts, 5);
//! ```
//!
//! ### Preview Run Against a CSV Ledger
//!
//! ```
//! use core_runtime::config::{LedgerBackend, RunMode, UploaderConfig};
//!
//! let config = UploaderConfig::builder()
//!     .root_dir("/videos")
//!     .ledger_backend(LedgerBackend::Csv)
//!     .mode(RunMode::Preview)
//!     .build()
//!     .expect("Failed to build config");
//! assert!(config.ledger.path.ends_with("uploader_ledger.csv"));
//! ```
//!
//! ## Error Handling
//!
//! The builder validates all settings and provides actionable error messages:
//!
//! ```should_panic
//! use core_runtime::config::UploaderConfig;
//!
//! // This will panic with an actionable error message
//! let config = UploaderConfig::builder()
//!     .build()
//!     .expect("Should fail - missing root directory");
//! ```

use crate::error::{Error, Result};
use bridge_traits::PrivacyStatus;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default SQLite ledger file name
pub const DEFAULT_SQLITE_LEDGER: &str = "uploader_ledger.sqlite";

/// Default CSV ledger file name
pub const DEFAULT_CSV_LEDGER: &str = "uploader_ledger.csv";

/// Resumable uploads accept chunks in multiples of this size
pub const CHUNK_GRANULARITY: usize = 256 * 1024;

/// Extensions eligible for upload, compared case-insensitively
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "m4v"];

/// Storage backend of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerBackend {
    /// Transactional SQLite database
    Sqlite,
    /// Append-only CSV log
    Csv,
}

impl LedgerBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerBackend::Sqlite => "sqlite",
            LedgerBackend::Csv => "csv",
        }
    }

    /// File name used when no explicit ledger path is configured
    pub fn default_file_name(&self) -> &'static str {
        match self {
            LedgerBackend::Sqlite => DEFAULT_SQLITE_LEDGER,
            LedgerBackend::Csv => DEFAULT_CSV_LEDGER,
        }
    }
}

impl fmt::Display for LedgerBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(LedgerBackend::Sqlite),
            "csv" => Ok(LedgerBackend::Csv),
            other => Err(Error::Config(format!(
                "Unknown ledger backend '{}'. Expected 'sqlite' or 'csv'.",
                other
            ))),
        }
    }
}

/// Where and how the ledger is stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub backend: LedgerBackend,
    pub path: PathBuf,
}

/// Whether a run talks to the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Upload files and create playlists remotely
    #[default]
    Upload,
    /// Walk the tree and fill the ledger with synthesized ids, no network
    Preview,
}

impl RunMode {
    pub fn is_preview(&self) -> bool {
        matches!(self, RunMode::Preview)
    }
}

/// What the orchestrator does after a file fails for a non-batch reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Report the failure and move on to the next file
    #[default]
    Continue,
    /// Stop the run after the first failed file
    Abort,
}

/// Chunking and retry settings of the transfer state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    /// Bytes sent per chunk, a multiple of [`CHUNK_GRANULARITY`]
    pub chunk_size_bytes: usize,
    /// Attempts per file (and per playlist attachment), including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Factor applied to the delay after every failed attempt
    pub backoff_multiplier: u32,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 32 * CHUNK_GRANULARITY,
            max_attempts: 5,
            initial_backoff: Duration::from_secs(5),
            backoff_multiplier: 2,
        }
    }
}

/// Metadata applied to every uploaded video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDefaults {
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: PrivacyStatus,
}

impl Default for VideoDefaults {
    fn default() -> Self {
        Self {
            description: "Uploaded using bulk uploader script".to_string(),
            tags: vec![
                "bulk".to_string(),
                "uploader".to_string(),
                "youtube".to_string(),
            ],
            category_id: "22".to_string(),
            privacy: PrivacyStatus::Unlisted,
        }
    }
}

/// Simulated progress emitted in preview mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSettings {
    /// Number of progress events per file; 0 disables simulation
    pub progress_steps: u32,
    /// Pause between simulated progress events
    pub step_delay: Duration,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            progress_steps: 10,
            step_delay: Duration::ZERO,
        }
    }
}

/// Complete configuration of one upload run.
///
/// Use [`UploaderConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Root of the directory tree; each subdirectory becomes a playlist
    pub root_dir: PathBuf,

    /// Ledger backend and location
    pub ledger: LedgerConfig,

    /// Upload or preview
    pub mode: RunMode,

    /// Chunking and retry settings
    pub transfer: TransferSettings,

    /// Metadata for uploaded videos
    pub video_defaults: VideoDefaults,

    /// Visibility of playlists created by the uploader
    pub playlist_privacy: PrivacyStatus,

    /// Lowercase extensions, without the leading dot
    pub video_extensions: Vec<String>,

    /// How often a paused run checks whether it was resumed or cancelled
    pub pause_poll_interval: Duration,

    /// Simulated progress in preview mode
    pub preview: PreviewSettings,

    /// Reaction to file-level failures
    pub failure_policy: FailurePolicy,

    /// Capacity of the event bus
    pub event_buffer: usize,
}

impl UploaderConfig {
    /// Creates a new builder for constructing an `UploaderConfig`.
    pub fn builder() -> UploaderConfigBuilder {
        UploaderConfigBuilder::default()
    }

    /// Whether `extension` (with or without leading dot) is an eligible video type
    pub fn is_video_extension(&self, extension: &str) -> bool {
        let extension = extension.trim_start_matches('.');
        self.video_extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(extension))
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Root and ledger paths are not empty
    /// - Chunk size is a non-zero multiple of 256 KiB
    /// - At least one attempt is allowed and the backoff does not shrink
    /// - The extension list is not empty
    /// - Poll interval and event buffer are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::Config("Root directory cannot be empty".to_string()));
        }

        if self.ledger.path.as_os_str().is_empty() {
            return Err(Error::Config("Ledger path cannot be empty".to_string()));
        }

        let chunk = self.transfer.chunk_size_bytes;
        if chunk == 0 || chunk % CHUNK_GRANULARITY != 0 {
            return Err(Error::Config(format!(
                "Chunk size must be a non-zero multiple of {} bytes (256 KiB), got {}",
                CHUNK_GRANULARITY, chunk
            )));
        }

        if self.transfer.max_attempts == 0 {
            return Err(Error::Config(
                "Transfer attempts must be at least 1".to_string(),
            ));
        }

        if self.transfer.backoff_multiplier == 0 {
            return Err(Error::Config(
                "Backoff multiplier must be at least 1".to_string(),
            ));
        }

        if self.video_extensions.is_empty() {
            return Err(Error::Config(
                "At least one video extension is required".to_string(),
            ));
        }

        if self.pause_poll_interval.is_zero() {
            return Err(Error::Config(
                "Pause poll interval must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(Error::Config(
                "Event buffer must hold at least one event".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`UploaderConfig`].
#[derive(Debug, Default)]
pub struct UploaderConfigBuilder {
    root_dir: Option<PathBuf>,
    ledger_backend: Option<LedgerBackend>,
    ledger_path: Option<PathBuf>,
    mode: RunMode,
    transfer: TransferSettings,
    video_defaults: Option<VideoDefaults>,
    playlist_privacy: Option<PrivacyStatus>,
    video_extensions: Option<Vec<String>>,
    pause_poll_interval: Option<Duration>,
    preview: PreviewSettings,
    failure_policy: FailurePolicy,
    event_buffer: Option<usize>,
}

impl UploaderConfigBuilder {
    /// Sets the root directory to walk (required).
    pub fn root_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Selects the ledger backend. Default: SQLite.
    pub fn ledger_backend(mut self, backend: LedgerBackend) -> Self {
        self.ledger_backend = Some(backend);
        self
    }

    /// Sets the ledger file path.
    ///
    /// Defaults to the backend's file name in the working directory.
    pub fn ledger_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.ledger_path = Some(path.into());
        self
    }

    pub fn mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(RunMode::Preview)` when `enabled`.
    pub fn preview(mut self, enabled: bool) -> Self {
        self.mode = if enabled {
            RunMode::Preview
        } else {
            RunMode::Upload
        };
        self
    }

    /// Sets the chunk size in bytes. Default: 8 MiB.
    pub fn chunk_size_bytes(mut self, bytes: usize) -> Self {
        self.transfer.chunk_size_bytes = bytes;
        self
    }

    /// Sets the attempts per file. Default: 5.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.transfer.max_attempts = attempts;
        self
    }

    /// Sets the delay before the first retry. Default: 5 seconds.
    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.transfer.initial_backoff = delay;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.transfer.backoff_multiplier = multiplier;
        self
    }

    pub fn video_defaults(mut self, defaults: VideoDefaults) -> Self {
        self.video_defaults = Some(defaults);
        self
    }

    /// Sets the visibility of created playlists. Default: private.
    pub fn playlist_privacy(mut self, privacy: PrivacyStatus) -> Self {
        self.playlist_privacy = Some(privacy);
        self
    }

    /// Replaces the eligible extensions. Leading dots are stripped.
    pub fn video_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.video_extensions = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        );
        self
    }

    /// Sets the pause polling interval. Default: 100 ms.
    pub fn pause_poll_interval(mut self, interval: Duration) -> Self {
        self.pause_poll_interval = Some(interval);
        self
    }

    pub fn preview_progress(mut self, steps: u32, step_delay: Duration) -> Self {
        self.preview = PreviewSettings {
            progress_steps: steps,
            step_delay,
        };
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = Some(capacity);
        self
    }

    /// Builds the final `UploaderConfig` instance.
    ///
    /// Returns `Error::Config` when the root directory is missing or any
    /// value fails [`UploaderConfig::validate`].
    pub fn build(self) -> Result<UploaderConfig> {
        let root_dir = self.root_dir.ok_or_else(|| {
            Error::Config("Root directory is required. Use .root_dir() to set it.".to_string())
        })?;

        let backend = self.ledger_backend.unwrap_or(LedgerBackend::Sqlite);
        let path = self
            .ledger_path
            .unwrap_or_else(|| PathBuf::from(backend.default_file_name()));

        let config = UploaderConfig {
            root_dir,
            ledger: LedgerConfig { backend, path },
            mode: self.mode,
            transfer: self.transfer,
            video_defaults: self.video_defaults.unwrap_or_default(),
            playlist_privacy: self.playlist_privacy.unwrap_or(PrivacyStatus::Private),
            video_extensions: self.video_extensions.unwrap_or_else(|| {
                DEFAULT_VIDEO_EXTENSIONS
                    .iter()
                    .map(|ext| ext.to_string())
                    .collect()
            }),
            pause_poll_interval: self
                .pause_poll_interval
                .unwrap_or(Duration::from_millis(100)),
            preview: self.preview,
            failure_policy: self.failure_policy,
            event_buffer: self.event_buffer.unwrap_or(256),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_root_dir() {
        let result = UploaderConfig::builder().build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Root directory is required"));
    }

    #[test]
    fn test_defaults() {
        let config = UploaderConfig::builder().root_dir("/videos").build().unwrap();

        assert_eq!(config.ledger.backend, LedgerBackend::Sqlite);
        assert_eq!(config.ledger.path, PathBuf::from(DEFAULT_SQLITE_LEDGER));
        assert_eq!(config.mode, RunMode::Upload);
        assert_eq!(config.transfer.max_attempts, 5);
        assert_eq!(config.transfer.initial_backoff, Duration::from_secs(5));
        assert_eq!(config.transfer.backoff_multiplier, 2);
        assert_eq!(config.playlist_privacy, PrivacyStatus::Private);
        assert_eq!(config.video_defaults.privacy, PrivacyStatus::Unlisted);
        assert_eq!(config.video_defaults.category_id, "22");
        assert_eq!(config.pause_poll_interval, Duration::from_millis(100));
        assert_eq!(config.failure_policy, FailurePolicy::Continue);
        assert_eq!(config.video_extensions.len(), 5);
    }

    #[test]
    fn test_csv_backend_uses_csv_default_path() {
        let config = UploaderConfig::builder()
            .root_dir("/videos")
            .ledger_backend(LedgerBackend::Csv)
            .build()
            .unwrap();

        assert_eq!(config.ledger.path, PathBuf::from(DEFAULT_CSV_LEDGER));
    }

    #[test]
    fn test_explicit_ledger_path_wins() {
        let config = UploaderConfig::builder()
            .root_dir("/videos")
            .ledger_backend(LedgerBackend::Csv)
            .ledger_path("/tmp/ledger.csv")
            .build()
            .unwrap();

        assert_eq!(config.ledger.path, PathBuf::from("/tmp/ledger.csv"));
    }

    #[test]
    fn test_validate_rejects_unaligned_chunk_size() {
        let result = UploaderConfig::builder()
            .root_dir("/videos")
            .chunk_size_bytes(1000)
            .build();

        let err = result.unwrap_err().to_string();
        assert!(err.contains("multiple of"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let result = UploaderConfig::builder()
            .root_dir("/videos")
            .max_attempts(0)
            .build();

        assert!(result.unwrap_err().to_string().contains("at least 1"));
    }

    #[test]
    fn test_validate_rejects_empty_extensions() {
        let result = UploaderConfig::builder()
            .root_dir("/videos")
            .video_extensions(Vec::<String>::new())
            .build();

        assert!(result.unwrap_err().to_string().contains("video extension"));
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let result = UploaderConfig::builder()
            .root_dir("/videos")
            .pause_poll_interval(Duration::ZERO)
            .build();

        assert!(result.is_err());
    }

    #[test]
    fn test_extension_matching_ignores_case_and_dot() {
        let config = UploaderConfig::builder()
            .root_dir("/videos")
            .video_extensions([".MP4", "mkv"])
            .build()
            .unwrap();

        assert!(config.is_video_extension("mp4"));
        assert!(config.is_video_extension(".MKV"));
        assert!(!config.is_video_extension("avi"));
    }

    #[test]
    fn test_preview_toggle() {
        let config = UploaderConfig::builder()
            .root_dir("/videos")
            .preview(true)
            .build()
            .unwrap();

        assert!(config.mode.is_preview());
    }

    #[test]
    fn test_ledger_backend_parsing() {
        assert_eq!("sqlite".parse::<LedgerBackend>().unwrap(), LedgerBackend::Sqlite);
        assert_eq!("CSV".parse::<LedgerBackend>().unwrap(), LedgerBackend::Csv);
        assert!("json".parse::<LedgerBackend>().is_err());
        assert_eq!(LedgerBackend::Csv.to_string(), "csv");
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = UploaderConfig::builder().root_dir("/videos").build().unwrap();
        let cloned = config.clone();
        assert_eq!(cloned.root_dir, config.root_dir);
    }
}
