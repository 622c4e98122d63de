use crate::api::TelegramApi;
use crate::error::{Result, TransportError};
use crate::types::Update;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const POLL_NON_TRANSIENT_DELAY: Duration = Duration::from_secs(10);
const POLL_RETRY_BASE_MS: u64 = 250;
const POLL_RETRY_MAX_MS: u64 = 30_000;

/// Long-polls `getUpdates` and forwards every update to `tx` until `shutdown`
/// fires or the receiver is dropped.
#[tracing::instrument(level = "info", skip_all)]
pub async fn run_poll_loop(
    api: TelegramApi,
    timeout_secs: u64,
    tx: mpsc::Sender<Update>,
    shutdown: CancellationToken,
) -> Result<()> {
    let mut offset: i64 = 0;
    let mut consecutive_failures: u32 = 0;

    loop {
        let polled = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            polled = api.get_updates(offset, timeout_secs) => polled,
        };

        let mut updates = match polled {
            Ok(updates) => updates,
            Err(error) => {
                let delay = if error.is_retryable() {
                    consecutive_failures += 1;
                    let delay = match &error {
                        TransportError::RateLimited { retry_after } => *retry_after,
                        _ => poll_retry_delay(consecutive_failures),
                    };
                    tracing::warn!(
                        %error,
                        attempt = consecutive_failures,
                        ?delay,
                        "telegram getUpdates failed; retrying with backoff"
                    );
                    delay
                } else {
                    consecutive_failures = 0;
                    tracing::error!(
                        %error,
                        ?POLL_NON_TRANSIENT_DELAY,
                        "telegram getUpdates non-transient failure; keeping poll loop alive"
                    );
                    POLL_NON_TRANSIENT_DELAY
                };
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
                continue;
            }
        };

        consecutive_failures = 0;
        updates.sort_by_key(|update| update.update_id);
        for update in updates {
            // Advance offset before dispatch to avoid poison-update replay loops.
            if update.update_id < offset {
                continue;
            }
            offset = update.update_id.saturating_add(1);
            if tx.send(update).await.is_err() {
                tracing::info!("update queue closed; stopping poll loop");
                return Ok(());
            }
        }
    }
}

fn poll_retry_delay(attempt: u32) -> Duration {
    let multiplier = 1_u64 << attempt.saturating_sub(1).min(10);
    Duration::from_millis((POLL_RETRY_BASE_MS * multiplier).min(POLL_RETRY_MAX_MS))
}

#[cfg(test)]
mod tests {
    use super::poll_retry_delay;

    #[test]
    fn poll_retry_delay_grows_exponentially_and_caps() {
        assert_eq!(poll_retry_delay(1).as_millis(), 250);
        assert_eq!(poll_retry_delay(4).as_millis(), 2000);
        assert_eq!(poll_retry_delay(20).as_millis(), 30000);
    }
}
