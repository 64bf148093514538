//! Time Abstraction
//!
//! Provides an injectable time source so that backoff and run timing can be
//! tested without waiting on the wall clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Time source trait
///
/// # Example
///
/// ```ignore
/// use bridge_traits::time::Clock;
///
/// async fn wait_then_stamp(clock: &dyn Clock) -> i64 {
///     clock.sleep(std::time::Duration::from_secs(5)).await;
///     clock.unix_timestamp()
/// }
/// ```
#[async_trait]
pub trait Clock: Send + Sync {
    /// Get current UTC time
    fn now(&self) -> DateTime<Utc>;

    /// Suspend the current task for `duration`
    async fn sleep(&self, duration: Duration);

    /// Get current Unix timestamp in seconds
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// System clock implementation using actual system time
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock() {
        let clock = SystemClock;
        let before = Utc::now().timestamp();
        let now = clock.unix_timestamp();
        assert!(now >= before);
    }

    #[tokio::test]
    async fn test_system_clock_zero_sleep_returns() {
        SystemClock.sleep(Duration::ZERO).await;
    }
}
