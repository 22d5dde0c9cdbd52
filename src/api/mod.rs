use std::future::Future;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::warn;

use crate::error::{DownloadError, Result};

pub mod quiver_client;
pub use quiver_client::QuiverClient;

/// Gate bounding the outbound request rate.
///
/// Permits are spaced `window / permits` apart, so no rolling `window` ever
/// sees more than `permits` requests; callers wait in `acquire`.
#[derive(Debug)]
pub struct RateGate {
    limiter: DefaultDirectRateLimiter,
}

impl RateGate {
    pub fn new(permits: u32, window: Duration) -> Result<Self> {
        let invalid = || DownloadError::InvalidRateLimit {
            permits,
            window_secs: window.as_secs(),
        };
        if permits == 0 {
            return Err(invalid());
        }
        // Burst of one keeps every permit a full period after the previous one
        let quota = Quota::with_period(window / permits).ok_or_else(invalid)?;

        Ok(Self {
            limiter: RateLimiter::direct(quota),
        })
    }

    /// Wait until a request may proceed
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

/// How many times to attempt an operation and how long to wait between tries
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Delay between two attempts
    pub fn backoff(&self) -> Duration {
        self.delay
    }

    /// Run `operation` until it succeeds or the attempts run out.
    ///
    /// `operation` receives the 1-based attempt number. The last error is
    /// folded into [`DownloadError::RetriesExhausted`] together with `target`.
    pub async fn execute<T, E, F, Fut>(&self, target: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!("⚠️ {} failed (retry {}/{}): {}", target, attempt, attempts, e);
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.backoff()).await;
                    }
                }
            }
        }

        Err(DownloadError::RetriesExhausted {
            target: target.to_string(),
            attempts,
            last_error,
        })
    }
}

/// Source of raw government contract data
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ContractDataProvider: Send + Sync {
    /// Fetch the raw body for a path relative to the vendor base URL.
    /// An empty string means the vendor has no data for the request.
    async fn fetch(&self, path: &str) -> Result<String>;
}
