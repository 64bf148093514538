//! # Event Bus System
//!
//! Provides the event stream of an upload run using `tokio::sync::broadcast`.
//! Front ends (the CLI progress bars, a GUI, a log forwarder) subscribe to it
//! instead of being called back by the upload core.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enum hierarchies for runs, playlists and uploads
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Orchestrator ├──────────────>│           │     subscribe    ┌──────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Progress UI  │
//! ┌──────────────┐     emit      │ (broadcast│                  └──────────────┘
//! │   Uploader   ├──────────────>│  channel) │     subscribe    ┌──────────────┐
//! └──────────────┘               │           ├─────────────────>│ Subscriber   │
//!                                └───────────┘                  └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, UploadEvent};
//!
//! let event_bus = EventBus::new(100);
//! let event = CoreEvent::Upload(UploadEvent::Progress {
//!     playlist_id: "PL123".to_string(),
//!     file_path: "/videos/trip/day1.mp4".to_string(),
//!     percent: 40,
//!     remaining_bytes: 1_048_576,
//! });
//!
//! // Emitting never blocks; an error only means nobody is listening.
//! event_bus.emit(event).ok();
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent};
//! use tokio::sync::broadcast::error::RecvError;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! tokio::spawn(async move {
//!     loop {
//!         match stream.recv().await {
//!             Ok(event) => println!("Received: {:?}", event),
//!             Err(RecvError::Lagged(n)) => {
//!                 eprintln!("Missed {} events", n);
//!             }
//!             Err(RecvError::Closed) => break,
//!         }
//!     }
//! });
//! # }
//! ```
//!
//! ## Event Types
//!
//! ### Run Events
//! - `Started`: Pre-scan finished, uploads begin
//! - `Progress`: Overall progress after each file
//! - `Paused` / `Resumed`: Observed at a file boundary
//! - `Completed`, `Cancelled`, `Failed`: Terminal states
//!
//! ### Playlist Events
//! - `Resolved`: A directory was mapped to a playlist id
//!
//! ### Upload Events
//! - `Started`, `Progress`, `RetryScheduled`, `Completed`, `Failed`
//!
//! ### Status
//! - Free-text status line for simple front ends
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Batch lifecycle and overall progress
    Run(RunEvent),
    /// Playlist resolution
    Playlist(PlaylistEvent),
    /// Per-file transfer events
    Upload(UploadEvent),
    /// Human-readable status line
    Status { message: String },
}

impl CoreEvent {
    /// Convenience constructor for a status line.
    pub fn status(message: impl Into<String>) -> Self {
        CoreEvent::Status {
            message: message.into(),
        }
    }

    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Run(e) => e.description(),
            CoreEvent::Playlist(e) => e.description(),
            CoreEvent::Upload(e) => e.description(),
            CoreEvent::Status { message } => message,
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Run(RunEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Upload(UploadEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Upload(UploadEvent::RetryScheduled { .. }) => EventSeverity::Warning,
            CoreEvent::Run(RunEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Run(RunEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Upload(UploadEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Playlist(PlaylistEvent::Resolved { .. }) => EventSeverity::Info,
            CoreEvent::Status { .. } => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Run Events
// ============================================================================

/// Events describing a whole batch run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum RunEvent {
    /// Pre-scan finished and processing begins.
    Started {
        run_id: String,
        /// Root directory being uploaded.
        root: String,
        /// Eligible files found by the pre-scan.
        total_files: u64,
        /// Number of directories that map to playlists.
        playlists: u64,
        /// Whether this is a preview run.
        preview: bool,
    },
    /// Overall progress, emitted after every processed file.
    Progress {
        run_id: String,
        /// Files processed so far, including failures and skips.
        processed: u64,
        total: u64,
        /// Progress percentage (0-100).
        percent: u8,
    },
    /// The run observed the pause flag at a file boundary.
    Paused { run_id: String },
    /// The run continues after a pause.
    Resumed { run_id: String },
    /// Every file was processed.
    Completed {
        run_id: String,
        uploaded: u64,
        /// Files already present in the ledger.
        skipped: u64,
        failed: u64,
        duration_secs: u64,
    },
    /// The run stopped at a file boundary on request.
    Cancelled { run_id: String, processed: u64 },
    /// A batch-fatal error stopped the run.
    Failed {
        run_id: String,
        message: String,
        processed: u64,
    },
}

impl RunEvent {
    fn description(&self) -> &str {
        match self {
            RunEvent::Started { .. } => "Upload run started",
            RunEvent::Progress { .. } => "Upload run in progress",
            RunEvent::Paused { .. } => "Upload run paused",
            RunEvent::Resumed { .. } => "Upload run resumed",
            RunEvent::Completed { .. } => "Upload run completed",
            RunEvent::Cancelled { .. } => "Upload run cancelled",
            RunEvent::Failed { .. } => "Upload run failed",
        }
    }
}

// ============================================================================
// Playlist Events
// ============================================================================

/// How a playlist id was obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistSource {
    /// Found in the local ledger
    Ledger,
    /// Found among the remote playlists by name
    Remote,
    /// Created remotely
    Created,
    /// Synthesized in preview mode
    Preview,
}

/// Events related to playlist resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaylistEvent {
    /// A directory was mapped to a playlist.
    Resolved {
        name: String,
        playlist_id: String,
        source: PlaylistSource,
    },
}

impl PlaylistEvent {
    fn description(&self) -> &str {
        match self {
            PlaylistEvent::Resolved { .. } => "Playlist resolved",
        }
    }
}

// ============================================================================
// Upload Events
// ============================================================================

/// Events related to a single file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum UploadEvent {
    /// Processing of a file began.
    Started {
        playlist: String,
        playlist_id: String,
        file_path: String,
        title: String,
    },
    /// The server acknowledged another chunk.
    Progress {
        playlist_id: String,
        file_path: String,
        /// Progress percentage (0-100).
        percent: u8,
        /// Bytes the server has not acknowledged yet.
        remaining_bytes: u64,
    },
    /// A transient failure occurred; the next attempt follows after `delay_ms`.
    RetryScheduled {
        file_path: String,
        /// "upload" or "attach"
        phase: String,
        /// The attempt that failed (1-based).
        attempt: u32,
        delay_ms: u64,
        message: String,
    },
    /// The file is recorded in the ledger.
    Completed {
        playlist_id: String,
        file_path: String,
        video_id: String,
        /// True when the ledger already held the file and nothing was sent.
        already_uploaded: bool,
    },
    /// The file could not be uploaded.
    Failed {
        file_path: String,
        message: String,
        /// True when the failure stops the whole run.
        batch_fatal: bool,
    },
}

impl UploadEvent {
    fn description(&self) -> &str {
        match self {
            UploadEvent::Started { .. } => "Upload started",
            UploadEvent::Progress { .. } => "Upload in progress",
            UploadEvent::RetryScheduled { .. } => "Upload retry scheduled",
            UploadEvent::Completed { .. } => "Upload completed",
            UploadEvent::Failed { .. } => "Upload failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus is cheap; all clones share one channel.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, CoreEvent};
///
/// # #[tokio::main]
/// # async fn main() {
/// let event_bus = EventBus::new(100);
/// let mut subscriber = event_bus.subscribe();
///
/// event_bus.emit(CoreEvent::status("Scanning")).ok();
/// assert_eq!(subscriber.recv().await.unwrap(), CoreEvent::status("Scanning"));
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are no active subscribers. Never blocks.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{EventBus, EventStream, CoreEvent};
///
/// let event_bus = EventBus::new(100);
/// let upload_stream = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Upload(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
