//! Bounded external-store calls
//!
//! Any store round trip is wrapped in [`bounded`], so a slow backend turns
//! into a typed error instead of a hung request.

use std::future::Future;
use std::time::Duration;

/// Default per-call bound
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} did not complete within {limit:?}")]
pub struct StoreTimeout {
    pub operation: &'static str,
    pub limit: Duration,
}

/// Run `fut` with a deadline of `limit`.
///
/// Returns the future's own output on time, or [`StoreTimeout`] naming
/// `operation` when the deadline passes first. The future is dropped on
/// timeout.
pub async fn bounded<F>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<F::Output, StoreTimeout>
where
    F: Future,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        tracing::warn!(operation, limit_ms = limit.as_millis() as u64, "store call timed out");
        StoreTimeout { operation, limit }
    })
}
