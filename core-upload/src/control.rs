//! Pause and cancel flags shared between a run and its controller
//!
//! Both are cooperative: the run observes them between files, so the file
//! in flight always finishes (or fails) first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Default)]
pub struct RunControl {
    paused: AtomicBool,
    cancel: CancellationToken,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pause(&self) {
        if !self.paused.swap(true, Ordering::SeqCst) {
            info!("Pause requested");
        }
    }

    pub fn resume(&self) {
        if self.paused.swap(false, Ordering::SeqCst) {
            info!("Resume requested");
        }
    }

    /// Stop before the next file. Also releases a paused run.
    pub fn cancel(&self) {
        info!("Cancellation requested");
        self.cancel.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token that fires on [`RunControl::cancel`]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Block while paused, polling every `poll`.
    ///
    /// Returns `false` if the run was cancelled, `true` once it may continue.
    pub async fn wait_while_paused(&self, poll: Duration) -> bool {
        while self.is_paused() {
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(poll) => {}
            }
        }
        !self.is_cancelled()
    }
}
