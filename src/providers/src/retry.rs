//! Capped exponential backoff for retryable provider errors (§4.1).

use crate::error::ProviderError;
use rand::Rng;
use std::future::Future;
use std::time::{Duration, Instant};

const INITIAL_DELAY: Duration = Duration::from_millis(500);
const BACKOFF_FACTOR: u32 = 2;
const MAX_ATTEMPTS: u32 = 4;
const MAX_TOTAL: Duration = Duration::from_secs(30);
const JITTER: f64 = 0.2;

/// Run `op` with the uniform retry policy: only `ProviderErrorKind`s marked
/// `retryable()` are retried, capped at 4 attempts and 30s total elapsed.
pub async fn with_backoff<T, F, Fut>(mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let start = Instant::now();
    let mut delay = INITIAL_DELAY;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.kind.retryable() && attempt < MAX_ATTEMPTS => {
                let elapsed = start.elapsed();
                if elapsed >= MAX_TOTAL {
                    return Err(err);
                }
                let jittered = jitter(delay);
                let remaining = MAX_TOTAL.saturating_sub(elapsed);
                tokio::time::sleep(jittered.min(remaining)).await;
                delay *= BACKOFF_FACTOR;
            }
            Err(err) => return Err(err),
        }
    }
}

fn jitter(base: Duration) -> Duration {
    let factor = rand::thread_rng().gen_range(1.0 - JITTER..=1.0 + JITTER);
    Duration::from_secs_f64(base.as_secs_f64() * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_retryable_kinds_up_to_four_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), ProviderError> = with_backoff(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::network("down"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn does_not_retry_non_retryable_kinds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result: Result<(), ProviderError> = with_backoff(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::new(ProviderErrorKind::Auth, "bad key"))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_without_retry_when_first_attempt_ok() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let result = with_backoff(|| {
            let calls = calls_clone.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ProviderError>(42)
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
