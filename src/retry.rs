//! Bounded retries for source reads.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

use crate::error::{MigrateError, ReadStep, StoreError};
use crate::types::{Key, RetryPolicy};

/// Runs `op` until it succeeds or the policy's retry budget is spent.
///
/// Every failed attempt counts against the budget, so a store that never
/// recovers ends in [`MigrateError::RetriesExhausted`] after
/// `policy.max_attempts()` calls.
pub(crate) async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    step: ReadStep,
    key: &Key,
    mut op: F,
) -> Result<T, MigrateError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = AtomicUsize::new(0);
    let strategy =
        FixedInterval::from_millis(policy.delay.as_millis() as u64).take(policy.max_retries);

    Retry::spawn(strategy, || {
        let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
        let fut = op();
        async move {
            match fut.await {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!("Error during {} of key {} (attempt {}): {}", step, key, attempt, e);
                    RetryError::to_transient(e)
                }
            }
        }
    })
    .await
    .map_err(|source| MigrateError::RetriesExhausted {
        step,
        key: key.clone(),
        attempts: attempts.load(Ordering::Relaxed),
        source,
    })
}
