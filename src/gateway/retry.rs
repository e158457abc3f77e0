//! Retry/backoff combinator shared by every gateway call.
//!
//! Attempt `k` (0-based) runs under `base_timeout * (k + 1)`. After a failed
//! attempt the combinator sleeps `backoff_unit * 2^k`, or
//! `backoff_unit * 2^k * rate_limit_multiplier` after an HTTP 429.

use super::AttemptFailure;
use crate::health::Service;
use crate::metrics;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_timeout: Duration,
    pub backoff_unit: Duration,
    pub rate_limit_multiplier: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_timeout,
            backoff_unit: Duration::from_secs(1),
            rate_limit_multiplier: 5,
        }
    }

    /// Completion defaults: 4 attempts, 30s base timeout.
    pub fn completion_default() -> Self {
        Self::new(4, Duration::from_secs(30))
    }

    /// Search defaults: 4 attempts, 10s base timeout.
    pub fn search_default() -> Self {
        Self::new(4, Duration::from_secs(10))
    }

    /// Shrink every wait; tests use this with millisecond units.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_base_timeout(mut self, base: Duration) -> Self {
        self.base_timeout = base;
        self
    }

    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout.saturating_mul(attempt.saturating_add(1))
    }

    pub fn backoff_for(&self, attempt: u32, failure: &AttemptFailure) -> Duration {
        let exp = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        let wait = self.backoff_unit.saturating_mul(exp);
        if failure.is_rate_limited() {
            wait.saturating_mul(self.rate_limit_multiplier)
        } else {
            wait
        }
    }
}

/// All attempts failed; `last` is the failure of the final attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last: AttemptFailure,
}

/// Run `op` under `policy`. The closure receives the attempt index and the
/// timeout for that attempt so it can build a fresh client per attempt.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    service: Service,
    mut op: F,
) -> Result<T, RetryExhausted>
where
    F: FnMut(u32, Duration) -> Fut,
    Fut: Future<Output = Result<T, AttemptFailure>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        let timeout = policy.timeout_for(attempt);
        metrics::record_attempt(service);
        tracing::debug!(
            target: "gateway",
            service = %service,
            attempt,
            timeout_ms = timeout.as_millis() as u64,
            "attempt started"
        );

        let outcome = match tokio::time::timeout(timeout, op(attempt, timeout)).await {
            Ok(r) => r,
            Err(_) => Err(AttemptFailure::Timeout(timeout)),
        };

        let failure = match outcome {
            Ok(value) => {
                tracing::info!(
                    target: "gateway",
                    service = %service,
                    attempt,
                    timeout_ms = timeout.as_millis() as u64,
                    outcome = "ok",
                    "attempt succeeded"
                );
                return Ok(value);
            }
            Err(f) => f,
        };

        metrics::record_attempt_failure(service);
        tracing::warn!(
            target: "gateway",
            service = %service,
            attempt,
            timeout_ms = timeout.as_millis() as u64,
            outcome = "failed",
            error = %failure,
            "attempt failed"
        );

        let attempts_used = attempt + 1;
        if !failure.is_retryable() || attempts_used >= max_attempts {
            return Err(RetryExhausted {
                attempts: attempts_used,
                last: failure,
            });
        }

        let wait = policy.backoff_for(attempt, &failure);
        tracing::debug!(
            target: "gateway",
            service = %service,
            attempt,
            wait_ms = wait.as_millis() as u64,
            "backing off"
        );
        tokio::time::sleep(wait).await;
        attempt = attempts_used;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn policy_ms() -> RetryPolicy {
        RetryPolicy::new(4, Duration::from_millis(100)).with_backoff_unit(Duration::from_millis(1))
    }

    #[test]
    fn timeout_grows_linearly() {
        let p = RetryPolicy::completion_default();
        assert_eq!(p.timeout_for(0), Duration::from_secs(30));
        assert_eq!(p.timeout_for(1), Duration::from_secs(60));
        assert_eq!(p.timeout_for(3), Duration::from_secs(120));
    }

    #[test]
    fn backoff_is_exponential_and_longer_for_429() {
        let p = RetryPolicy::completion_default();
        let err = AttemptFailure::Status(500);
        assert_eq!(p.backoff_for(0, &err), Duration::from_secs(1));
        assert_eq!(p.backoff_for(2, &err), Duration::from_secs(4));
        let rl = AttemptFailure::RateLimited;
        assert_eq!(p.backoff_for(0, &rl), Duration::from_secs(5));
        assert_eq!(p.backoff_for(1, &rl), Duration::from_secs(10));
        assert_eq!(p.backoff_for(3, &rl), Duration::from_secs(40));
    }

    #[tokio::test(start_paused = true)]
    async fn passes_per_attempt_timeout_to_op() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let res: Result<(), _> = run_with_retry(&policy_ms(), Service::Completion, |k, t| {
            seen2.lock().unwrap().push((k, t));
            async { Err(AttemptFailure::Status(500)) }
        })
        .await;

        let err = res.unwrap_err();
        assert_eq!(err.attempts, 4);
        assert_eq!(err.last, AttemptFailure::Status(500));
        let seen = seen.lock().unwrap();
        let timeouts: Vec<u64> = seen.iter().map(|(_, t)| t.as_millis() as u64).collect();
        assert_eq!(timeouts, vec![100, 200, 300, 400]);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_five_units_after_429() {
        let start = Instant::now();
        let calls = Arc::new(Mutex::new(0u32));
        let c = calls.clone();
        let res = run_with_retry(&policy_ms(), Service::Completion, move |k, _| {
            *c.lock().unwrap() += 1;
            async move {
                if k == 0 {
                    Err(AttemptFailure::RateLimited)
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(res.unwrap(), "done");
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_wait_doubles_per_attempt() {
        let start = Instant::now();
        let res = run_with_retry(&policy_ms(), Service::Search, |k, _| async move {
            if k < 2 {
                Err(AttemptFailure::RateLimited)
            } else {
                Ok(k)
            }
        })
        .await;
        assert_eq!(res.unwrap(), 2);
        // 1ms*1*5 + 1ms*2*5
        assert_eq!(start.elapsed(), Duration::from_millis(15));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out_and_retries() {
        let res = run_with_retry(&policy_ms(), Service::Completion, |k, _| async move {
            if k == 0 {
                tokio::time::sleep(Duration::from_secs(10)).await;
            }
            Ok::<_, AttemptFailure>(k)
        })
        .await;
        assert_eq!(res.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn misconfigured_stops_immediately() {
        let res: Result<(), _> = run_with_retry(&policy_ms(), Service::Completion, |_, _| async {
            Err(AttemptFailure::Misconfigured("missing api key".into()))
        })
        .await;
        assert_eq!(res.unwrap_err().attempts, 1);
    }
}
