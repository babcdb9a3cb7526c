//! Bounded retries with exponential backoff
//!
//! The one retry surface in the core: catalog discovery re-attempts a failed
//! backend listing a fixed number of times with doubling delays. Transport
//! retries inside the HTTP client and task retries in the scheduler keep
//! their own bookkeeping; neither goes through here.

use std::future::Future;
use std::time::Duration;

/// Longest pause between attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delays to sleep between failed attempts: the base, then doubling, capped
/// at [`MAX_BACKOFF`] (or a custom cap)
#[derive(Debug, Clone)]
pub struct BackoffSchedule {
    next_delay: Duration,
    cap: Duration,
}

impl BackoffSchedule {
    pub fn starting_at(base: Duration) -> Self {
        Self {
            next_delay: base,
            cap: MAX_BACKOFF,
        }
    }

    pub fn with_cap(mut self, cap: Duration) -> Self {
        self.cap = cap;
        self
    }
}

impl Iterator for BackoffSchedule {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next_delay.min(self.cap);
        self.next_delay = self.next_delay.saturating_mul(2);
        Some(current)
    }
}

/// Call an idempotent async operation up to `attempts` times
///
/// Sleeps for the schedule's next delay after each failure short of the
/// last; the final error is returned once the attempt budget is gone.
pub async fn retry_with_backoff<F, Fut, T, E>(
    attempts: usize,
    mut schedule: BackoffSchedule,
    operation: F,
) -> std::result::Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt >= attempts => return Err(error),
            Err(error) => {
                let delay = schedule.next().unwrap_or(MAX_BACKOFF);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, %error, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
