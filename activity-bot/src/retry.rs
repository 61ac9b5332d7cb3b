//! Retry budget for chain reads and for tasks whose transaction never
//! reached the mempool. Every wait ends early on shutdown.

use activity_clients::TxError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const READ_ATTEMPTS: u32 = 3;
const READ_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Shutdown was requested while waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Resolve `fut` unless `shutdown` fires first.
pub async fn until_cancelled<F: Future>(
    shutdown: &CancellationToken,
    fut: F,
) -> Result<F::Output, Cancelled> {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => Err(Cancelled),
        output = fut => Ok(output),
    }
}

/// Sleep for `delay`, or fail at once if shutdown was requested.
pub async fn pause(shutdown: &CancellationToken, delay: Duration) -> Result<(), Cancelled> {
    if delay.is_zero() {
        return if shutdown.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        };
    }
    until_cancelled(shutdown, tokio::time::sleep(delay)).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Cap for the doubling delay.
    pub max_delay: Duration,
}

impl RetryConfig {
    /// A single attempt.
    pub const fn once() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// The same `delay` before every retry.
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: delay,
            max_delay: delay,
        }
    }

    /// `base_delay` doubled after each failure, capped at `max_delay`.
    pub fn doubling(base_delay: Duration, max_attempts: u32, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    pub fn for_reads() -> Self {
        Self::fixed(READ_RETRY_DELAY, READ_ATTEMPTS)
    }

    /// Delay before attempt `failed + 1`.
    pub fn delay_after(&self, failed: u32) -> Duration {
        let shift = failed.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << shift)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    pub fn attempts<'a>(&'a self, shutdown: &'a CancellationToken) -> Attempts<'a> {
        Attempts {
            config: self,
            shutdown,
            failed: 0,
        }
    }
}

/// Tracks one operation's failures against a [`RetryConfig`].
pub struct Attempts<'a> {
    config: &'a RetryConfig,
    shutdown: &'a CancellationToken,
    failed: u32,
}

impl Attempts<'_> {
    /// Record `error` and wait out the backoff. `Ok(true)` means try again,
    /// `Ok(false)` means the error is final.
    pub async fn retry_after(&mut self, operation: &str, error: &TxError) -> Result<bool, Cancelled> {
        self.failed += 1;

        if !error.is_retryable() {
            debug!(operation, kind = error.kind(), "Non-retryable error");
            return Ok(false);
        }
        if self.failed >= self.config.max_attempts {
            if self.config.max_attempts > 1 {
                warn!(
                    operation,
                    attempts = self.failed,
                    error = %error,
                    "Retry attempts exhausted"
                );
            }
            return Ok(false);
        }

        let delay = self.config.delay_after(self.failed);
        warn!(
            operation,
            attempt = self.failed,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Failed before broadcast, retrying"
        );
        pause(self.shutdown, delay).await?;
        Ok(true)
    }
}
