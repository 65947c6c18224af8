//! Bounded retries for transient API failures.
//!
//! Rate limiting (429), server errors without a JSON answer and dropped
//! connections are retried with a doubling delay; everything else is
//! returned to the caller at once.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::error::Error;

#[derive(Debug, Clone)]
pub struct BackoffParams {
    /// Delay before the second try
    pub first_delay: Duration,
    pub factor: u32,
    /// Upper bound for any single delay
    pub ceiling: Duration,
    /// Total tries, the first one included
    pub tries: u32,
}

impl Default for BackoffParams {
    fn default() -> Self {
        Self {
            first_delay: Duration::from_millis(500),
            factor: 2,
            ceiling: Duration::from_secs(10),
            tries: 3,
        }
    }
}

impl BackoffParams {
    pub fn with_max_tries(max_tries: u32) -> Self {
        Self {
            tries: max_tries.max(1),
            ..Self::default()
        }
    }

    /// Delay after the `failures`-th failed try.
    fn delay_after(&self, failures: u32) -> Duration {
        let growth = self.factor.saturating_pow(failures.saturating_sub(1));
        self.first_delay.saturating_mul(growth).min(self.ceiling)
    }
}

/// Run `attempt` until it succeeds, fails with an error `transient`
/// rejects, or the try budget is used up.
pub async fn retry_with_backoff<F, Fut, T, E, P>(
    mut attempt: F,
    transient: P,
    params: &BackoffParams,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    let mut failures = 0u32;
    loop {
        let err = match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        failures += 1;
        if failures >= params.tries || !transient(&err) {
            return Err(err);
        }

        let delay = params.delay_after(failures);
        debug!(
            "Transient failure {} of {} ({:?}), next try in {:?}",
            failures, params.tries, err, delay
        );
        sleep(delay).await;
    }
}

/// [`retry_with_backoff`] using [`Error::is_retriable`].
pub async fn retry_api<F, Fut, T>(attempt: F, params: &BackoffParams) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    retry_with_backoff(attempt, Error::is_retriable, params).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick(tries: u32) -> BackoffParams {
        BackoffParams {
            first_delay: Duration::from_millis(1),
            factor: 2,
            ceiling: Duration::from_millis(4),
            tries,
        }
    }

    #[test]
    fn test_delay_doubles_up_to_ceiling() {
        let params = BackoffParams::default();
        assert_eq!(params.delay_after(1), Duration::from_millis(500));
        assert_eq!(params.delay_after(2), Duration::from_millis(1000));
        assert_eq!(params.delay_after(3), Duration::from_millis(2000));
        assert_eq!(params.delay_after(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_rate_limit_is_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = retry_api(
            || async move {
                match calls.fetch_add(1, Ordering::SeqCst) {
                    0 => Err(Error::api(429, "Too Many Requests", "")),
                    1 => Err(Error::api(502, "Bad Gateway", "")),
                    _ => Ok("done"),
                }
            },
            &quick(5),
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: crate::Result<()> = retry_api(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::api(404, "Not Found", ""))
            },
            &quick(5),
        )
        .await;

        assert!(matches!(result, Err(Error::Api { status: 404, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: crate::Result<()> = retry_api(
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::api(503, "Service Unavailable", ""))
            },
            &quick(3),
        )
        .await;

        assert!(matches!(result, Err(Error::Api { status: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_with_max_tries_floor() {
        assert_eq!(BackoffParams::with_max_tries(0).tries, 1);
        assert_eq!(BackoffParams::with_max_tries(4).tries, 4);
    }
}
