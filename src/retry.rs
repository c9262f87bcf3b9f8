//! Generic retry/backoff wrapper for external-service calls.
//!
//! Generalizes the capped-exponential backoff loop the embedding providers
//! wrote inline into a reusable function that any external call (LLM,
//! embeddings, future connectors) can share.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs_f64(1.0),
            max_delay: Duration::from_secs_f64(60.0),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Tighter schedule used by the embedding client (matches the original
    /// `EmbeddingService`'s own `RetryConfig(max_retries=3, max_delay=10.0)`).
    pub fn embedding() -> Self {
        Self {
            max_delay: Duration::from_secs_f64(10.0),
            ..Self::default()
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.initial_delay.as_secs_f64() * self.exponential_base.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let secs = if self.jitter {
            let jitter_frac = rand::thread_rng().gen_range(-0.1..=0.1);
            (capped * (1.0 + jitter_frac)).max(0.0)
        } else {
            capped
        };
        Duration::from_secs_f64(secs)
    }
}

/// Whether a failure is worth retrying. Non-retryable failures short-circuit
/// immediately instead of burning through the retry budget.
pub trait Classify {
    fn is_retryable(&self) -> bool;
}

/// Run `f` up to `max_retries + 1` times, sleeping with exponential backoff
/// between attempts. Returns the last error if every attempt is exhausted or
/// the first non-retryable error encountered.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, mut f: F) -> Result<T, E>
where
    E: Classify,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                if attempt >= config.max_retries || !e.is_retryable() {
                    return Err(e);
                }
                let delay = config.delay_for(attempt);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Fail(bool);
    impl Classify for Fail {
        fn is_retryable(&self) -> bool {
            self.0
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
            ..Default::default()
        };
        let result: Result<u32, Fail> = with_retry(&cfg, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Fail(true))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_short_circuits() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig::default();
        let result: Result<u32, Fail> = with_retry(&cfg, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Fail(false)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_after_max_retries() {
        let calls = AtomicU32::new(0);
        let cfg = RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            jitter: false,
            ..Default::default()
        };
        let result: Result<u32, Fail> = with_retry(&cfg, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Fail(true)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn delay_never_exceeds_max() {
        let cfg = RetryConfig {
            initial_delay: Duration::from_secs_f64(1.0),
            max_delay: Duration::from_secs_f64(5.0),
            exponential_base: 2.0,
            jitter: true,
            ..Default::default()
        };
        for attempt in 0..10 {
            let d = cfg.delay_for(attempt);
            assert!(d.as_secs_f64() <= 5.5);
        }
    }
}
