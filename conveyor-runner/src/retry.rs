//! Bounded retry with exponential backoff

use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// How many times to try an operation and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay: Duration,

    /// Upper bound for the doubled delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            max_delay,
        }
    }

    /// A policy that retries without sleeping, for tests
    #[allow(dead_code)]
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Same backoff, different attempt budget
    pub fn with_attempts(self, max_attempts: u32) -> Self {
        Self::new(max_attempts, self.initial_delay, self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(10))
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent
///
/// # Arguments
/// * `policy` - Attempt budget and backoff
/// * `what` - Short description used in log lines
/// * `is_retryable` - Decides whether an error is worth another attempt
/// * `op` - Produces a fresh future for each attempt
///
/// # Returns
/// The first success, or the last error
pub async fn retry<T, E, Fut, Op, R>(
    policy: RetryPolicy,
    what: &str,
    is_retryable: R,
    mut op: Op,
) -> Result<T, E>
where
    E: std::fmt::Display,
    Fut: Future<Output = Result<T, E>>,
    Op: FnMut() -> Fut,
    R: Fn(&E) -> bool,
{
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;

        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    info!("{} succeeded after {} attempt(s)", what, attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if attempt >= policy.max_attempts || !is_retryable(&e) {
                    return Err(e);
                }

                warn!(
                    "{} failed (attempt {}/{}): {}",
                    what, attempt, policy.max_attempts, e
                );
                warn!("Retrying in {} ms...", delay.as_millis());

                tokio::time::sleep(delay).await;

                // Exponential backoff with cap
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}
