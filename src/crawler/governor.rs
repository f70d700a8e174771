//! Minimum-interval request governor
//!
//! The code search API enforces a hard per-minute cap, so every governed request waits
//! until the configured interval has elapsed since the previous one. Requests are issued
//! strictly sequentially, so there is never more than one waiter.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateGovernor {
    /// Minimum time between two permitted requests
    min_interval: Duration,

    /// When the last request was permitted
    last_request: Option<Instant>,
}

impl RateGovernor {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Waits until a request is permitted, then records it
    pub async fn throttle(&mut self) {
        if let Some(wait) = self.time_until_next_request(Instant::now()) {
            tracing::trace!("Rate governor waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        self.last_request = Some(Instant::now());
    }

    /// Returns None if a request can be made now, or the duration to wait otherwise
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }
}
