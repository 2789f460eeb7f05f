//! Bounded retry with exponential backoff for external calls.

use crate::client::{LlmClient, LlmRequest, LlmResponse};
use estate_core::{AppError, AppResult};
use std::future::Future;
use std::time::Duration;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often and how patiently a failing call is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first try included (at least 1)
    pub max_attempts: u32,

    /// Sleep before the first retry; doubled after every failure
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }

    /// Policy that never sleeps, for tests.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }

    /// Backoff after the given failed attempt (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .checked_mul(factor)
            .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF))
    }

    /// Run `operation` until it succeeds or attempts are exhausted.
    ///
    /// Returns the last error on exhaustion; callers translate it into the
    /// error kind that fits their step.
    pub async fn run<T, F, Fut>(&self, label: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.max_attempts => {
                    tracing::error!("{} failed after {} attempts: {}", label, attempt, e);
                    return Err(e);
                }
                Err(e) => {
                    let backoff = self.backoff_for(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {}ms: {}",
                        label,
                        attempt,
                        self.max_attempts,
                        backoff.as_millis(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Run a completion under `policy`, surfacing exhaustion as `AppError::Completion`.
pub async fn complete_with_retry(
    client: &dyn LlmClient,
    request: &LlmRequest,
    policy: &RetryPolicy,
) -> AppResult<LlmResponse> {
    policy
        .run("chat completion", || client.complete(request))
        .await
        .map_err(|e| {
            AppError::Completion(format!(
                "{} request failed after {} attempts: {}",
                client.provider_name(),
                policy.max_attempts,
                e
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::LlmUsage;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyClient {
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl LlmClient for FlakyClient {
        fn provider_name(&self) -> &str {
            "flaky"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures_before_success {
                return Err(AppError::Llm("503 Service Unavailable".to_string()));
            }
            Ok(LlmResponse {
                content: "ok".to_string(),
                model: request.model.clone(),
                usage: LlmUsage::default(),
            })
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_for(40), MAX_BACKOFF);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_recovers_before_exhaustion() {
        let client = FlakyClient {
            failures_before_success: 2,
            calls: AtomicU32::new(0),
        };
        let request = LlmRequest::new("hi", "m");

        let response = complete_with_retry(&client, &request, &RetryPolicy::immediate(3))
            .await
            .unwrap();
        assert_eq!(response.content, "ok");
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_completion_error() {
        let client = FlakyClient {
            failures_before_success: u32::MAX,
            calls: AtomicU32::new(0),
        };
        let request = LlmRequest::new("hi", "m");

        let err = complete_with_retry(&client, &request, &RetryPolicy::immediate(3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Completion(_)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 3);
    }
}
