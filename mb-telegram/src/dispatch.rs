//! Rate-limited outbound calls with retry.
//!
//! With a limiter the call takes a permit, retries transient failures
//! (network errors, 429, 5xx) with backoff, and keeps the permit for the
//! limiter's spacing interval. Without a limiter the call is issued once.

use crate::api::BotApi;
use crate::error::{Result, TransportError};
use crate::limiter::{OperationKind, RateLimiter};
use crate::types::{EditMessageText, SendMessage};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32, error: &TransportError) -> Duration {
        if let TransportError::RateLimited { retry_after } = error {
            return (*retry_after).min(self.max_delay);
        }
        transient_retry_delay(self.base_delay, self.max_delay, attempt)
    }
}

fn transient_retry_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let multiplier = 1_u32 << attempt.saturating_sub(1).min(10);
    base.saturating_mul(multiplier).min(max)
}

#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn BotApi>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn BotApi>, policy: RetryPolicy) -> Self {
        Self { api, policy }
    }

    pub fn api(&self) -> &Arc<dyn BotApi> {
        &self.api
    }

    pub async fn send_message(
        &self,
        limiter: Option<&RateLimiter>,
        cancel: &CancellationToken,
        request: &SendMessage,
    ) -> Result<i64> {
        self.call(OperationKind::Send, limiter, cancel, || {
            self.api.send_message(request)
        })
        .await
    }

    pub async fn edit_message_text(
        &self,
        limiter: Option<&RateLimiter>,
        cancel: &CancellationToken,
        request: &EditMessageText,
    ) -> Result<()> {
        self.call(OperationKind::Edit, limiter, cancel, || {
            self.api.edit_message_text(request)
        })
        .await
    }

    pub async fn delete_message(
        &self,
        limiter: Option<&RateLimiter>,
        cancel: &CancellationToken,
        chat_id: i64,
        message_id: i64,
    ) -> Result<()> {
        self.call(OperationKind::Delete, limiter, cancel, || {
            self.api.delete_message(chat_id, message_id)
        })
        .await
    }

    async fn call<T, F, Fut>(
        &self,
        kind: OperationKind,
        limiter: Option<&RateLimiter>,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(limiter) = limiter else {
            return cancellable(cancel, op()).await;
        };

        let permit = limiter.acquire(kind, cancel).await?;
        let result = self.with_retry(kind, cancel, &op).await;
        if matches!(result, Err(TransportError::Cancelled)) {
            drop(permit);
        } else {
            limiter.release_after_spacing(permit, cancel);
        }
        result
    }

    async fn with_retry<T, F, Fut>(
        &self,
        kind: OperationKind,
        cancel: &CancellationToken,
        op: &F,
    ) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match cancellable(cancel, op()).await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            if !error.is_retryable() || attempt >= max_attempts {
                if error.is_retryable() {
                    tracing::warn!(
                        operation = kind.as_str(),
                        %error,
                        attempt,
                        "outbound call failed; retries exhausted"
                    );
                }
                return Err(error);
            }
            let delay = self.policy.delay_for(attempt, &error);
            tracing::warn!(
                operation = kind.as_str(),
                %error,
                attempt,
                ?delay,
                "outbound call failed; retrying with backoff"
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::{Dispatcher, RetryPolicy, transient_retry_delay};
    use crate::api::BotApi;
    use crate::error::{Result, TransportError};
    use crate::limiter::{OperationKind, RateLimiter};
    use crate::types::{EditMessageText, InlineQueryResultArticle, SendMessage};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    /// Replays scripted failures, then succeeds.
    #[derive(Default)]
    struct ScriptedApi {
        failures: Mutex<VecDeque<TransportError>>,
        calls: AtomicU32,
    }

    impl ScriptedApi {
        fn failing_with(errors: Vec<TransportError>) -> Arc<Self> {
            Arc::new(Self {
                failures: Mutex::new(errors.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn next(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.failures.lock().expect("lock").pop_front() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl BotApi for ScriptedApi {
        async fn send_message(&self, _request: &SendMessage) -> Result<i64> {
            self.next().map(|_| 42)
        }

        async fn edit_message_text(&self, _request: &EditMessageText) -> Result<()> {
            self.next()
        }

        async fn delete_message(&self, _chat_id: i64, _message_id: i64) -> Result<()> {
            self.next()
        }

        async fn answer_callback_query(&self, _id: &str, _text: Option<&str>) -> Result<()> {
            Ok(())
        }

        async fn answer_inline_query(
            &self,
            _id: &str,
            _results: &[InlineQueryResultArticle],
        ) -> Result<()> {
            Ok(())
        }
    }

    fn transient() -> TransportError {
        TransportError::Transient("connection reset".to_string())
    }

    #[test]
    fn retry_delay_grows_exponentially_and_caps() {
        let base = Duration::from_millis(250);
        let max = Duration::from_secs(30);
        assert_eq!(transient_retry_delay(base, max, 1).as_millis(), 250);
        assert_eq!(transient_retry_delay(base, max, 2).as_millis(), 500);
        assert_eq!(transient_retry_delay(base, max, 3).as_millis(), 1000);
        assert_eq!(transient_retry_delay(base, max, 20).as_millis(), 30000);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_under_a_limiter() {
        let api = ScriptedApi::failing_with(vec![
            transient(),
            TransportError::RateLimited {
                retry_after: Duration::from_secs(3),
            },
        ]);
        let dispatcher = Dispatcher::new(api.clone(), RetryPolicy::default());
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let started = Instant::now();

        let id = dispatcher
            .send_message(Some(&limiter), &CancellationToken::new(), &SendMessage::new(1, "hi"))
            .await
            .expect("third attempt succeeds");

        assert_eq!(id, 42);
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(3250));
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_returned_without_retry() {
        let api = ScriptedApi::failing_with(vec![TransportError::Permanent {
            code: 400,
            description: "message to delete not found".to_string(),
        }]);
        let dispatcher = Dispatcher::new(api.clone(), RetryPolicy::default());
        let limiter = RateLimiter::new(1, Duration::from_secs(1));

        let err = dispatcher
            .delete_message(Some(&limiter), &CancellationToken::new(), 1, 2)
            .await
            .expect_err("permanent failure");

        assert!(matches!(err, TransportError::Permanent { code: 400, .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let api = ScriptedApi::failing_with(vec![transient(), transient(), transient(), transient()]);
        let dispatcher = Dispatcher::new(api.clone(), RetryPolicy::default());
        let limiter = RateLimiter::new(1, Duration::ZERO);

        let err = dispatcher
            .edit_message_text(
                Some(&limiter),
                &CancellationToken::new(),
                &EditMessageText::default(),
            )
            .await
            .expect_err("exhausted");

        assert!(err.is_retryable());
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn without_limiter_the_call_is_issued_once() {
        let api = ScriptedApi::failing_with(vec![transient()]);
        let dispatcher = Dispatcher::new(api.clone(), RetryPolicy::default());

        let err = dispatcher
            .send_message(None, &CancellationToken::new(), &SendMessage::new(1, "hi"))
            .await
            .expect_err("no retry without limiter");

        assert!(err.is_retryable());
        assert_eq!(api.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_releases_the_permit() {
        let api = ScriptedApi::failing_with(vec![TransportError::RateLimited {
            retry_after: Duration::from_secs(20),
        }]);
        let dispatcher = Dispatcher::new(api.clone(), RetryPolicy::default());
        let limiter = RateLimiter::new(1, Duration::from_secs(1));
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let err = dispatcher
            .send_message(Some(&limiter), &cancel, &SendMessage::new(1, "hi"))
            .await
            .expect_err("cancelled");

        assert!(matches!(err, TransportError::Cancelled));
        assert_eq!(limiter.available(OperationKind::Send), 1);
    }
}
