//! Spacing limiter for outbound Bot API calls.
//!
//! Each operation kind owns a semaphore. A permit is taken before the call and
//! handed back only after `spacing` has elapsed since the call finished, so
//! consecutive calls of one kind are spaced out across all handler tasks.

use crate::error::{Result, TransportError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Send,
    Edit,
    Delete,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OperationKind::Send => "send",
            OperationKind::Edit => "edit",
            OperationKind::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiter {
    send: Arc<Semaphore>,
    edit: Arc<Semaphore>,
    delete: Arc<Semaphore>,
    spacing: Duration,
}

impl RateLimiter {
    pub fn new(capacity: usize, spacing: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            send: Arc::new(Semaphore::new(capacity)),
            edit: Arc::new(Semaphore::new(capacity)),
            delete: Arc::new(Semaphore::new(capacity)),
            spacing,
        }
    }

    fn semaphore(&self, kind: OperationKind) -> &Arc<Semaphore> {
        match kind {
            OperationKind::Send => &self.send,
            OperationKind::Edit => &self.edit,
            OperationKind::Delete => &self.delete,
        }
    }

    pub fn available(&self, kind: OperationKind) -> usize {
        self.semaphore(kind).available_permits()
    }

    /// Waits for a permit, giving up when `cancel` fires.
    pub async fn acquire(
        &self,
        kind: OperationKind,
        cancel: &CancellationToken,
    ) -> Result<OwnedSemaphorePermit> {
        let semaphore = self.semaphore(kind).clone();
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            permit = semaphore.acquire_owned() => {
                permit.map_err(|_| TransportError::Transient("rate limiter closed".to_string()))
            }
        }
    }

    /// Keeps `permit` for the spacing interval, then drops it. Cancellation
    /// releases it early.
    pub fn release_after_spacing(&self, permit: OwnedSemaphorePermit, cancel: &CancellationToken) {
        let spacing = self.spacing;
        if spacing.is_zero() {
            return;
        }
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(spacing) => {}
            }
            drop(permit);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{OperationKind, RateLimiter};
    use crate::TransportError;
    use std::time::Duration;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    #[tokio::test(start_paused = true)]
    async fn permit_is_held_for_the_spacing_interval() {
        let limiter = RateLimiter::new(1, Duration::from_secs(2));
        let cancel = CancellationToken::new();

        let permit = limiter
            .acquire(OperationKind::Send, &cancel)
            .await
            .expect("first permit");
        let released_at = Instant::now();
        limiter.release_after_spacing(permit, &cancel);
        assert_eq!(limiter.available(OperationKind::Send), 0);

        let _second = limiter
            .acquire(OperationKind::Send, &cancel)
            .await
            .expect("second permit");
        assert!(released_at.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn kinds_are_limited_independently() {
        let limiter = RateLimiter::new(1, Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let _send = limiter
            .acquire(OperationKind::Send, &cancel)
            .await
            .expect("send permit");
        assert_eq!(limiter.available(OperationKind::Edit), 1);
        assert_eq!(limiter.available(OperationKind::Delete), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_aborts_waiting_and_releases_held_permits() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let cancel = CancellationToken::new();
        let permit = limiter
            .acquire(OperationKind::Delete, &cancel)
            .await
            .expect("permit");
        limiter.release_after_spacing(permit, &cancel);

        let waiter_cancel = CancellationToken::new();
        waiter_cancel.cancel();
        let err = limiter
            .acquire(OperationKind::Delete, &waiter_cancel)
            .await
            .expect_err("cancelled waiter");
        assert!(matches!(err, TransportError::Cancelled));

        cancel.cancel();
        let started = Instant::now();
        let _permit = limiter
            .acquire(OperationKind::Delete, &CancellationToken::new())
            .await
            .expect("released after cancel");
        assert!(started.elapsed() < Duration::from_secs(60));
    }
}
