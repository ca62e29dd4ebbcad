//! Single-retry policy for provider calls.
//!
//! A retryable failure ([`Error::is_retryable`]) is retried exactly once,
//! after `rate_limit_delay` for rate limits or `transport_delay` for other
//! service errors. The second failure is returned as-is.
//!
//! [`RetryingEmbedder`] applies the policy to every batch an embedding
//! provider is asked for, so an index build retries per batch.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use course_assistant_core::embedding::EmbeddingProvider;
use course_assistant_core::{Error, Result};
use tracing::warn;

use crate::config::{RetryConfig, MAX_RETRY_DELAY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub rate_limit_delay: Duration,
    pub transport_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            rate_limit_delay: Duration::from_millis(config.rate_limit_delay_ms)
                .min(MAX_RETRY_DELAY),
            transport_delay: Duration::from_millis(config.transport_delay_ms).min(MAX_RETRY_DELAY),
        }
    }

    /// Delay before retrying after `error`, or `None` if it is not retryable.
    pub fn delay_for(&self, error: &Error) -> Option<Duration> {
        if error.is_rate_limited() {
            Some(self.rate_limit_delay)
        } else if error.is_retryable() {
            Some(self.transport_delay)
        } else {
            None
        }
    }

    /// Run `op`, retrying once on a retryable error.
    ///
    /// `what` names the call in log output.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(error) => {
                let Some(delay) = self.delay_for(&error) else {
                    return Err(error);
                };
                warn!(
                    call = what,
                    delay_ms = delay.as_millis() as u64,
                    %error,
                    "retrying once"
                );
                tokio::time::sleep(delay).await;
                op().await
            }
        }
    }
}

/// Embedding provider that runs each `embed` call through a [`RetryPolicy`].
pub struct RetryingEmbedder<'a> {
    inner: &'a dyn EmbeddingProvider,
    policy: RetryPolicy,
}

impl<'a> RetryingEmbedder<'a> {
    pub fn new(inner: &'a dyn EmbeddingProvider, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<'a> EmbeddingProvider for RetryingEmbedder<'a> {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = self.inner;
        self.policy
            .run("embedding batch", || inner.embed(texts))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_assistant_core::Service;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast() -> RetryPolicy {
        RetryPolicy {
            rate_limit_delay: Duration::from_millis(5),
            transport_delay: Duration::from_millis(1),
        }
    }

    fn rate_limited() -> Error {
        Error::RateLimited {
            service: Service::Generation,
            message: "429".to_string(),
        }
    }

    #[tokio::test]
    async fn test_success_is_not_retried() {
        let calls = AtomicUsize::new(0);
        let result = fast()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_retried_once_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result = fast()
            .run("op", || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(rate_limited())
                } else {
                    Ok("answer")
                }
            })
            .await;
        assert_eq!(result, Ok("answer"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_second_failure_surfaces() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(rate_limited())
            })
            .await;
        assert!(result.unwrap_err().is_rate_limited());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast()
            .run("op", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::DimensionMismatch {
                    expected: 3,
                    actual: 2,
                })
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Fails with a rate limit on its first call only.
    struct FlakyEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        fn model_name(&self) -> &str {
            "flaky"
        }
        fn dims(&self) -> usize {
            1
        }
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(Error::RateLimited {
                    service: Service::Embedding,
                    message: "429".to_string(),
                });
            }
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn test_retrying_embedder_retries_batch() {
        let flaky = FlakyEmbedder {
            calls: AtomicUsize::new(0),
        };
        let embedder = RetryingEmbedder::new(&flaky, fast());
        assert_eq!(embedder.model_name(), "flaky");
        assert_eq!(embedder.dims(), 1);

        let vectors = embedder.embed(&["a".to_string()]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0]]);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delays_by_error_kind() {
        let policy = fast();
        assert_eq!(policy.delay_for(&rate_limited()), Some(Duration::from_millis(5)));
        assert_eq!(
            policy.delay_for(&Error::EmbeddingService("reset".into())),
            Some(Duration::from_millis(1))
        );
        assert_eq!(policy.delay_for(&Error::EmptyCorpus), None);
    }

    #[test]
    fn test_from_config_caps_delay() {
        let policy = RetryPolicy::from_config(&RetryConfig {
            rate_limit_delay_ms: 600_000,
            transport_delay_ms: 250,
        });
        assert_eq!(policy.rate_limit_delay, MAX_RETRY_DELAY);
        assert_eq!(policy.transport_delay, Duration::from_millis(250));
    }
}
