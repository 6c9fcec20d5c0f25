use crate::error::CollaboratorError;
use crate::metrics;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

type Result<T> = std::result::Result<T, CollaboratorError>;

#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    None,
    Linear { max_attempts: u32, delay_ms: u64 },
    Exponential { max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64 },
}

impl RetryStrategy {
    /// Exponential backoff capped at 16x the base delay
    pub fn exponential(max_attempts: u32, base_delay_ms: u64) -> Self {
        if max_attempts <= 1 {
            return RetryStrategy::None;
        }
        RetryStrategy::Exponential {
            max_attempts,
            base_delay_ms,
            max_delay_ms: base_delay_ms.saturating_mul(16),
        }
    }

    fn max_attempts(&self) -> u32 {
        match self {
            RetryStrategy::None => 1,
            RetryStrategy::Linear { max_attempts, .. }
            | RetryStrategy::Exponential { max_attempts, .. } => (*max_attempts).max(1),
        }
    }

    /// Delay before attempt `attempt + 1`, given `attempt` already failed
    fn delay_after(&self, attempt: u32) -> Duration {
        match self {
            RetryStrategy::None => Duration::ZERO,
            RetryStrategy::Linear { delay_ms, .. } => Duration::from_millis(*delay_ms),
            RetryStrategy::Exponential {
                base_delay_ms,
                max_delay_ms,
                ..
            } => {
                let factor = 1u64 << (attempt.saturating_sub(1)).min(32);
                Duration::from_millis(base_delay_ms.saturating_mul(factor).min(*max_delay_ms))
            }
        }
    }
}

/// Retry executor for calls to outside services.
///
/// Only errors whose [`CollaboratorError::is_recoverable`] is true are retried.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    strategy: RetryStrategy,
}

impl RetryExecutor {
    pub fn new(strategy: RetryStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T>(&self, service: &'static str, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_attempts = self.strategy.max_attempts();
        let mut attempt = 1;

        loop {
            debug!("{} attempt {} of {}", service, attempt, max_attempts);

            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    if !err.is_recoverable() || attempt >= max_attempts {
                        return Err(err);
                    }

                    let delay = self.strategy.delay_after(attempt);
                    warn!(
                        "{} attempt {} failed: {}, retrying in {}ms",
                        service,
                        attempt,
                        err,
                        delay.as_millis()
                    );
                    metrics::COLLABORATOR_RETRIES
                        .with_label_values(&[service])
                        .inc();
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryStrategy::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transport() -> CollaboratorError {
        CollaboratorError::Transport {
            service: "test",
            message: "connection reset".to_string(),
        }
    }

    #[test]
    fn test_exponential_delays_are_capped() {
        let strategy = RetryStrategy::Exponential {
            max_attempts: 10,
            base_delay_ms: 100,
            max_delay_ms: 400,
        };
        assert_eq!(strategy.delay_after(1), Duration::from_millis(100));
        assert_eq!(strategy.delay_after(2), Duration::from_millis(200));
        assert_eq!(strategy.delay_after(3), Duration::from_millis(400));
        assert_eq!(strategy.delay_after(9), Duration::from_millis(400));
    }

    #[test]
    fn test_single_attempt_means_no_retry() {
        assert_eq!(RetryStrategy::exponential(1, 100), RetryStrategy::None);
        assert_eq!(RetryStrategy::exponential(0, 100), RetryStrategy::None);
    }

    #[test]
    fn test_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let executor = RetryExecutor::new(RetryStrategy::Linear {
            max_attempts: 3,
            delay_ms: 1,
        });

        let result = tokio_test::block_on(executor.execute("test", move || async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(transport())
            } else {
                Ok(42)
            }
        }));

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let executor = RetryExecutor::new(RetryStrategy::exponential(3, 1));

        let result: Result<()> = executor
            .execute("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(transport())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let executor = RetryExecutor::new(RetryStrategy::exponential(5, 1));

        let result: Result<()> = executor
            .execute("test", move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(CollaboratorError::Status {
                    service: "test",
                    status: 400,
                    body: "bad image_path".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(CollaboratorError::Status { status: 400, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
