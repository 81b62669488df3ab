use async_trait::async_trait;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Abstraction over waiting, so backoff can be exercised without real delays.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded-attempt exponential backoff with jitter.
///
/// Before retry `i` (1-based) it waits `base^i` seconds plus up to one second
/// of jitter, capped at `max_interval`. The first attempt runs immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    base_interval: Duration,
    max_interval: Duration,
}

impl RetryPolicy {
    /// `attempts` is clamped to at least one.
    pub fn new(attempts: u32, base_interval: Duration, max_interval: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_interval,
            max_interval,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    /// Wait before retry number `retry` (>= 1) with the given jitter added.
    pub fn backoff(&self, retry: u32, jitter: Duration) -> Duration {
        let exp = self.base_interval.as_secs_f64().powi(retry as i32);
        let wait = Duration::try_from_secs_f64(exp)
            .ok()
            .and_then(|d| d.checked_add(jitter))
            .unwrap_or(self.max_interval);
        wait.min(self.max_interval)
    }

    fn jittered_backoff(&self, retry: u32) -> Duration {
        let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
        self.backoff(retry, jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5), Duration::from_secs(120))
    }
}

/// Runs `action` until it succeeds or the policy's attempts are exhausted.
///
/// Returns the first success, otherwise the error of the last attempt.
pub async fn retry<F, Fut, T, E>(sleeper: &dyn Sleeper, policy: &RetryPolicy, mut action: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            let wait = policy.jittered_backoff(attempt);
            debug!(attempt = attempt + 1, wait_ms = wait.as_millis() as u64, "Backing off before retry");
            sleeper.sleep(wait).await;
        }

        match action().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= policy.attempts {
                    return Err(e);
                }
                warn!(
                    attempt = attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Attempt failed, retrying"
                );
            }
        }
    }
}
