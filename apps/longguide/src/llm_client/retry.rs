//! Bounded retry with exponential backoff for generation calls.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::GenerationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    /// Four attempts with 1s, 2s, 4s between them.
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 1000,
            multiplier: 2.0,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Retries immediately.
    #[cfg(test)]
    pub fn without_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff_ms: 0,
            multiplier: 1.0,
            max_backoff_ms: 0,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1) as i32;
        let millis = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(millis.min(self.max_backoff_ms as f64) as u64)
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    /// `op` receives the 1-based attempt number.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, GenerationError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error: Option<GenerationError> = None;

        for attempt in 1..=attempts {
            if let Some(err) = &last_error {
                let delay = self.backoff_for(attempt - 1);
                warn!(
                    "Generation attempt {}/{} failed ({err}), retrying after {}ms",
                    attempt - 1,
                    attempts,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() => last_error = Some(err),
                Err(err) => return Err(err),
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(GenerationError::Transient(format!(
            "gave up after {attempts} attempts: {last}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_schedule_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_backoff_ms: 1000,
            multiplier: 2.0,
            max_backoff_ms: 5000,
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff_for(4), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::default()
            .execute(|attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(GenerationError::Transient("429".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::without_backoff(5)
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GenerationError::Permanent("400".into())) }
            })
            .await;

        assert_eq!(result.unwrap_err(), GenerationError::Permanent("400".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_stay_transient() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = RetryPolicy::without_backoff(3)
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(GenerationError::Transient("503".into())) }
            })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("gave up after 3 attempts"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let result = RetryPolicy::without_backoff(0)
            .execute(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, GenerationError>(1) }
            })
            .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
