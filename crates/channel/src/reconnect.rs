//! Exponential-backoff reconnection for the push channel.
//!
//! When the transport drops, the connection task calls
//! [`reconnect_loop`] to keep retrying with increasing delays until the
//! connection (including room re-join) is restored or the
//! [`CancellationToken`] is triggered.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::transport::ChannelError;

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay from the current delay and config.
///
/// The result is clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Retry `attempt` with exponential backoff.
///
/// The first attempt is made after [`ReconnectConfig::initial_delay`].
/// Returns `Some(value)` once an attempt succeeds, or `None` if `cancel`
/// is triggered first.
pub async fn reconnect_loop<T, F, Fut>(
    config: &ReconnectConfig,
    cancel: &CancellationToken,
    mut attempt: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ChannelError>>,
{
    let mut delay = config.initial_delay;
    let mut attempt_no = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt_no += 1;
        tracing::info!(
            attempt = attempt_no,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to push channel",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnect cancelled");
                return None;
            }
            result = attempt() => {
                match result {
                    Ok(value) => {
                        tracing::info!(attempt = attempt_no, "Reconnected to push channel");
                        return Some(value);
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "Reconnect attempt {attempt_no} failed",
                        );
                    }
                }
            }
        }

        delay = next_delay(delay, config);
    }
}
