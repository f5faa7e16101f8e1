//! The one piece of state shared by concurrent generation calls.

use std::time::Duration;

use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;

use super::GenerationError;

/// Caps in-flight requests and, optionally, spaces out request starts.
pub struct RateLimiter {
    permits: Semaphore,
    min_interval: Option<Duration>,
    next_start: Mutex<Instant>,
}

impl RateLimiter {
    pub fn new(max_in_flight: usize, requests_per_minute: Option<u32>) -> Self {
        let min_interval = requests_per_minute
            .filter(|rpm| *rpm > 0)
            .map(|rpm| Duration::from_secs_f64(60.0 / rpm as f64));

        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            min_interval,
            next_start: Mutex::new(Instant::now()),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Semaphore::MAX_PERMITS, None)
    }

    /// Waits for a free slot. The request may start once this returns and
    /// must hold the permit until it completes.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, GenerationError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GenerationError::Permanent("rate limiter closed".to_string()))?;

        if let Some(interval) = self.min_interval {
            let start = {
                let mut next = self.next_start.lock().await;
                let start = (*next).max(Instant::now());
                *next = start + interval;
                start
            };
            tokio::time::sleep_until(start).await;
        }

        Ok(permit)
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
