//! Bounded retry with a fixed inter-attempt delay.

use crate::error::Result;
use crate::logger::Logger;
use std::future::Future;
use std::time::Duration;

/// Attempt ceiling and spacing for registry requests.
///
/// Constant spacing, no backoff: registries behind CDNs recover from the
/// failure modes worth retrying (DNS hiccups, dropped connections) within a
/// few seconds, and a package install should not stall for minutes.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(5000),
        }
    }
}

/// Run `op` until it succeeds, fails non-transiently, or the attempt ceiling
/// is reached. The last error is surfaced on exhaustion.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    logger: &dyn Logger,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                logger.warn(&format!(
                    "Attempt {attempt} of {attempts} failed ({err}), retrying in {}ms",
                    policy.delay.as_millis()
                ));
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => return Err(err),
        }
    }
    unreachable!("retry loop always returns")
}
