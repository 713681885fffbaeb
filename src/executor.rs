use crate::traits::StoreError;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed per-attempt backoff. `delays.len()` is the number of retries, so the
/// default three delays give four total tries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(&[5_000, 10_000, 30_000])
    }
}

impl RetryPolicy {
    pub fn from_millis(delays_ms: &[u64]) -> Self {
        Self {
            delays: delays_ms.iter().copied().map(Duration::from_millis).collect(),
        }
    }

    pub fn no_retry() -> Self {
        Self { delays: Vec::new() }
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len() + 1
    }
}

/// Wraps every outbound store call with bounded retries.
///
/// The executor only decides whether to try again; on exhaustion it hands the
/// last error back unchanged and the caller decides what it means.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 0usize;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "Store call recovered after retry");
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => {
                    let Some(delay) = self.policy.delays.get(attempt).copied() else {
                        warn!(operation, attempts = attempt + 1, error = %err, "Retries exhausted");
                        return Err(err);
                    };
                    attempt += 1;
                    warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying store call"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::from_millis(&[1, 2, 3])
    }

    #[test]
    fn test_default_policy_has_three_increasing_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert!(policy.delays.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute("search", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, StoreError>(42)
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute("copy", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(StoreError::Status {
                        status: 503,
                        reason: "Service Unavailable".into(),
                    })
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = executor
            .execute("search", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Timeout(format!("attempt {n}")))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result, Err(StoreError::Timeout("attempt 3".into())));
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let executor = RetryExecutor::new(fast_policy());
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = executor
            .execute("move", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(StoreError::Status {
                    status: 401,
                    reason: "Unauthorized".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(StoreError::Status { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
