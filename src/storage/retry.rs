//! Bounded retry for transient storage faults
//!
//! The schedule is fixed, not exponential: an immediate first attempt
//! followed by waits of 1s, 3s, and 5s. Only errors classified as
//! transient (`StorageError::is_transient`) are retried; anything else
//! aborts immediately.
//!
//! Cancellation: the delays are plain `tokio::time::sleep` calls, so
//! dropping the caller's future (e.g. the HTTP request is aborted)
//! cancels the sequence between attempts rather than continuing the
//! schedule.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use super::error::StorageResult;

/// Delay before each attempt, in order. Four attempts total.
pub(crate) const RETRY_DELAYS: [Duration; 4] = [
    Duration::ZERO,
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

/// Run `op` up to four times, sleeping per `RETRY_DELAYS` before each
/// attempt. Returns the first success, the first non-transient error,
/// or the last transient error once the schedule is exhausted.
pub(crate) async fn with_retries<T, Fut>(mut op: impl FnMut() -> Fut) -> StorageResult<T>
where
    Fut: Future<Output = StorageResult<T>>,
{
    let mut attempt = 0;
    loop {
        let delay = RETRY_DELAYS[attempt];
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt + 1 < RETRY_DELAYS.len() => {
                attempt += 1;
                warn!(
                    "transient storage fault, retrying (attempt {}/{}): {}",
                    attempt + 1,
                    RETRY_DELAYS.len(),
                    err
                );
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::error::StorageError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn transient_failures_succeed_on_fourth_attempt() {
        let attempts = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result = with_retries(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Err(StorageError::Unavailable("connection dropped".into()))
                } else {
                    Ok(n + 1)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 4);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        // Delays 0 + 1 + 3 + 5 seconds, in order.
        assert_eq!(started.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn schedule_exhaustion_surfaces_last_error() {
        let attempts = AtomicUsize::new(0);

        let result: StorageResult<()> = with_retries(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::Unavailable("still down".into())) }
        })
        .await;

        assert!(matches!(result, Err(StorageError::Unavailable(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_abort_immediately() {
        let attempts = AtomicUsize::new(0);
        let started = tokio::time::Instant::now();

        let result: StorageResult<()> = with_retries(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::Permanent("constraint violation".into())) }
        })
        .await;

        assert!(matches!(result, Err(StorageError::Permanent(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt_skips_delays() {
        let started = tokio::time::Instant::now();

        let result = with_retries(|| async { Ok(42) }).await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
