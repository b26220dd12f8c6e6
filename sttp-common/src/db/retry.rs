//! Lock retry for SQLite writes
//!
//! Every write issued by the job and transcript repositories goes through
//! [`retry_on_lock`]. Only "database is locked" / "busy" failures are
//! retried; anything else is returned on the first attempt.

use crate::{Error, Result};
use std::time::{Duration, Instant};

const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Run `operation` until it succeeds, fails for another reason, or
/// `max_wait_ms` has passed
///
/// The pause between attempts starts at 10 ms and doubles up to 1 s. When
/// the budget runs out the lock error becomes [`Error::Internal`].
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let budget = Duration::from_millis(max_wait_ms);
    let started = Instant::now();
    let mut backoff = INITIAL_BACKOFF;
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempts,
                        waited_ms = started.elapsed().as_millis(),
                        "Write succeeded after lock contention"
                    );
                }
                return Ok(value);
            }
            Err(err) if err.is_lock_contention() => err,
            Err(err) => return Err(err),
        };

        let waited = started.elapsed();
        if waited >= budget {
            tracing::error!(
                operation = operation_name,
                attempts,
                waited_ms = waited.as_millis(),
                error = %err,
                "Giving up on locked database"
            );
            return Err(Error::Internal(format!(
                "Database locked: {} gave up after {} attempts in {} ms",
                operation_name,
                attempts,
                waited.as_millis()
            )));
        }

        tracing::debug!(
            operation = operation_name,
            attempts,
            backoff_ms = backoff.as_millis(),
            "Database locked, backing off"
        );
        tokio::time::sleep(backoff.min(budget - waited)).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}
