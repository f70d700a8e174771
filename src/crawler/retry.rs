//! Retry logic with exponential backoff
//!
//! Wraps a single remote call. Transient failures (see [`ApiError::is_retryable`]) are
//! retried with exponentially growing, optionally jittered delays until the attempt
//! ceiling is reached. A rate-limit signal carrying a reset time stretches the delay up
//! to that time, bounded by the policy's maximum delay.
//!
//! The two failure shapes are kept apart so callers can tell "gave up after trying"
//! ([`RetryFailure::Exhausted`]) from "this call cannot succeed" ([`RetryFailure::Rejected`]).

use crate::config::RetryConfig;
use crate::crawler::governor::RateGovernor;
use crate::{ApiError, ApiResult};
use chrono::Utc;
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Why a retried call ultimately failed
#[derive(Debug)]
pub enum RetryFailure {
    /// Every attempt failed with a retryable error
    Exhausted { attempts: u32, last: ApiError },

    /// A non-retryable error ended the call
    Rejected(ApiError),
}

impl fmt::Display for RetryFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted { attempts, last } => {
                write!(f, "gave up after {} attempts: {}", attempts, last)
            }
            Self::Rejected(err) => write!(f, "{}", err),
        }
    }
}

/// Bounded exponential backoff for one class of calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `operation` until it succeeds, fails permanently, or the ceiling is hit
    ///
    /// # Arguments
    ///
    /// * `name` - Operation name used in log messages
    /// * `governor` - When set, every attempt waits for the rate governor first
    /// * `operation` - Produces a fresh future for each attempt
    pub async fn run<F, Fut, T>(
        &self,
        name: &str,
        mut governor: Option<&mut RateGovernor>,
        mut operation: F,
    ) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.initial_delay();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if let Some(governor) = governor.as_deref_mut() {
                governor.throttle().await;
            }

            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        tracing::info!("{} succeeded after {} attempts", name, attempt);
                    }
                    return Ok(result);
                }
                Err(err) if !err.is_retryable() => {
                    tracing::debug!("{} failed with non-retryable error: {}", name, err);
                    return Err(RetryFailure::Rejected(err));
                }
                Err(err) if attempt >= max_attempts => {
                    tracing::warn!(
                        "{} failed after all {} attempts: {}",
                        name,
                        attempt,
                        err
                    );
                    return Err(RetryFailure::Exhausted {
                        attempts: attempt,
                        last: err,
                    });
                }
                Err(err) => {
                    let wait = self.delay_for(&err, delay);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        name,
                        attempt,
                        max_attempts,
                        wait,
                        err
                    );
                    tokio::time::sleep(wait).await;

                    // The product can overflow Duration for large multipliers
                    let next = Duration::try_from_secs_f64(
                        delay.as_secs_f64() * self.config.backoff_multiplier,
                    )
                    .unwrap_or(self.config.max_delay());
                    delay = next.min(self.config.max_delay());
                }
            }
        }
    }

    /// Delay before the next attempt
    ///
    /// Never exceeds the configured maximum delay.
    fn delay_for(&self, err: &ApiError, base: Duration) -> Duration {
        let mut wait = if self.config.jitter {
            add_jitter(base)
        } else {
            base
        };

        if let ApiError::RateLimited {
            reset_at: Some(reset_at),
        } = err
        {
            if let Ok(until_reset) = (*reset_at - Utc::now()).to_std() {
                wait = wait.max(until_reset);
            }
        }

        wait.min(self.config.max_delay())
    }
}

/// Add random jitter to a delay
///
/// The actual delay will be between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
