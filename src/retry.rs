//! Bounded retry for best-effort secondary writes.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op` up to `attempts` times with a fixed `delay` between
/// attempts. Returns the first success or the last error. Intended for
/// writes whose ultimate failure must not fail the enclosing operation;
/// the caller decides what exhaustion means.
pub async fn retry_with_delay<T, E, F, Fut>(
    attempts: u32,
    delay: Duration,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(
                    operation = label,
                    attempt = attempt,
                    max_attempts = attempts,
                    error = %err,
                    "Retryable operation failed"
                );
                last_err = Some(err);
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    // attempts >= 1, so at least one error was recorded.
    Err(last_err.unwrap())
}
