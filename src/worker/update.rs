//! Result submission with bounded retry
//!
//! Failed attempt `k` waits `base_delay * 2^(k-1)` before attempt `k+1`.
//! When every attempt fails the result is abandoned; the server requeues
//! the task once its response timeout expires.

use std::time::{Duration, Instant};

use backoff::{backoff::Backoff, ExponentialBackoff};
use tracing::{debug, warn};

use crate::client::TaskClient;
use crate::error::{Error, Result};
use crate::metrics::{Counter, Metrics, Timing};
use crate::types::TaskResult;

/// Retry settings for result submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (at least 1)
    pub attempts: u32,

    /// Delay after the first failed attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            base_delay,
        }
    }

    /// Delay sequence between attempts, no jitter
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: Duration::from_secs(3600),
            max_elapsed_time: None,
            ..Default::default()
        }
    }

    /// Delays that would be slept between attempts
    pub fn delays(&self) -> Vec<Duration> {
        let mut backoff = self.backoff();
        (1..self.attempts)
            .filter_map(|_| backoff.next_backoff())
            .collect()
    }
}

/// Submit `result`, retrying per `policy`
pub async fn submit_with_retry(
    client: &dyn TaskClient,
    metrics: &Metrics,
    policy: RetryPolicy,
    task_type: &str,
    result: &TaskResult,
) -> Result<()> {
    let attempts = policy.attempts.max(1);
    let mut backoff = policy.backoff();
    let mut last_error = None;

    for attempt in 1..=attempts {
        let started = Instant::now();
        let outcome = client.update_task(result).await;
        metrics.record(Timing::Update, task_type, started.elapsed());

        match outcome {
            Ok(()) => {
                debug!(
                    task_id = %result.task_id,
                    task_type,
                    status = %result.status,
                    attempt,
                    "Task result submitted"
                );
                return Ok(());
            }
            Err(e) => {
                metrics.incr(Counter::UpdateErrors, task_type);
                warn!(
                    task_id = %result.task_id,
                    task_type,
                    attempt,
                    max_attempts = attempts,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Failed to submit task result"
                );
                last_error = Some(e);
            }
        }

        if attempt < attempts {
            let delay = backoff.next_backoff().unwrap_or(policy.base_delay);
            tokio::time::sleep(delay).await;
        }
    }

    metrics.incr(Counter::UpdateFailures, task_type);
    Err(Error::UpdateRetriesExhausted {
        task_id: result.task_id.clone(),
        attempts,
        last_error: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_of_two_delays() {
        let policy = RetryPolicy::new(4, Duration::from_millis(100));
        assert_eq!(
            policy.delays(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempts, 3);
        assert_eq!(
            policy.delays(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[test]
    fn test_zero_attempts_is_raised_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.attempts, 1);
        assert!(policy.delays().is_empty());
    }
}
