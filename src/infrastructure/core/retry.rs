use crate::domain::errors::{MetricsError, MetricsResult};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Bounded, fixed-delay retry used for initial backend connections
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Run `connect` until it succeeds or the attempts are exhausted.
    ///
    /// Exhaustion surfaces as [`MetricsError::Connect`] carrying the last error.
    pub async fn connect<T, E, F, Fut>(&self, target: &str, mut connect: F) -> MetricsResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match connect().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(target = %target, attempt, "Connected after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        target = %target,
                        attempt,
                        attempts,
                        error = %last_error,
                        "Connection attempt failed"
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        Err(MetricsError::Connect {
            target: target.to_string(),
            attempts,
            reason: last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let value = policy
            .connect("db", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("refused")
                } else {
                    Ok(42)
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_connect_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::new(2, Duration::from_millis(1));

        let err = policy
            .connect("cache", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("refused")
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        match err {
            MetricsError::Connect {
                target,
                attempts,
                reason,
            } => {
                assert_eq!(target, "cache");
                assert_eq!(attempts, 2);
                assert_eq!(reason, "refused");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
