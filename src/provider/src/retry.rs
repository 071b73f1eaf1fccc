use std::{future::Future, time::Duration};

use serde::{Deserialize, Serialize};

/// Bounded retry with backoff for optimistic-concurrency conflicts.
/// Defaults mirror the directory client's default conflict retry: 5
/// attempts starting at 10ms with a flat factor and 10% jitter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
    pub factor: f64,
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(10),
            factor: 1.0,
            jitter: 0.1,
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.delay.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(base * (1.0 + self.jitter * rand::random::<f64>()))
    }
}

/// Runs `op` until it succeeds, fails with a non-conflict error, or the
/// attempt budget is spent. Only errors matching `is_conflict` are retried;
/// the last conflict error surfaces once the budget is exhausted. `op` must
/// re-read whatever state it depends on at every attempt.
pub async fn retry_on_conflict<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    is_conflict: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if is_conflict(&e) => {
                attempt += 1;
                if attempt >= policy.attempts {
                    return Err(e);
                }
                tokio::time::sleep(policy.backoff(attempt - 1)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, PartialEq, Eq)]
    enum TestError {
        Conflict,
        Fatal,
    }

    fn is_conflict(e: &TestError) -> bool {
        matches!(e, TestError::Conflict)
    }

    fn quick() -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(1),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn works_success_after_conflicts() {
        let calls = AtomicU32::new(0);
        let res = retry_on_conflict(&quick(), is_conflict, || {
            let calls = &calls;
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TestError::Conflict)
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fails_when_budget_exhausted() {
        let calls = AtomicU32::new(0);
        let res: Result<(), TestError> = retry_on_conflict(&quick(), is_conflict, || {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Conflict)
            }
        })
        .await;
        assert_eq!(res.unwrap_err(), TestError::Conflict);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn fails_fast_on_non_conflict() {
        let calls = AtomicU32::new(0);
        let res: Result<(), TestError> = retry_on_conflict(&quick(), is_conflict, || {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Fatal)
            }
        })
        .await;
        assert_eq!(res.unwrap_err(), TestError::Fatal);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
