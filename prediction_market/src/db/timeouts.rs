//! Query deadlines
//!
//! Every settlement read and audit write is bounded so a stalled connection
//! surfaces as an error instead of holding the tournament lock forever.

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Deadline for single queries (5 seconds)
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for the settlement commit transaction (10 seconds)
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Error type for bounded queries
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    /// Deadline passed before the query finished
    #[error("Database operation timed out after {0:?}")]
    Timeout(Duration),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for bounded queries
pub type TimeoutResult<T> = Result<T, TimeoutError>;

/// Run a query with a deadline
///
/// # Example
///
/// ```no_run
/// use prediction_market::db::timeouts::{with_timeout, DEFAULT_QUERY_TIMEOUT};
/// # use sqlx::PgPool;
/// # async fn example(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
///
/// let row = with_timeout(
///     DEFAULT_QUERY_TIMEOUT,
///     sqlx::query("SELECT status FROM tournaments WHERE id = $1")
///         .bind(1_i64)
///         .fetch_one(pool)
/// ).await?;
///
/// # Ok(())
/// # }
/// ```
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutError::Database(e)),
        Err(_) => Err(TimeoutError::Timeout(duration)),
    }
}

/// Run a query with the default deadline (5 seconds)
pub async fn with_default_timeout<F, T>(future: F) -> TimeoutResult<T>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    with_timeout(DEFAULT_QUERY_TIMEOUT, future).await
}

/// Bound an operation that fails with something other than `sqlx::Error`.
///
/// Expiry goes through `on_timeout`, so callers keep their own error type.
pub async fn with_deadline<F, T, E>(
    duration: Duration,
    future: F,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    timeout(duration, future)
        .await
        .unwrap_or_else(|_| Err(on_timeout(duration)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_constants() {
        assert_eq!(DEFAULT_QUERY_TIMEOUT.as_secs(), 5);
        assert_eq!(DEFAULT_TRANSACTION_TIMEOUT.as_secs(), 10);
    }

    #[test]
    fn test_timeout_error_display() {
        let err = TimeoutError::Timeout(Duration::from_secs(5));
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("5s"));
    }

    #[tokio::test]
    async fn test_deadline_maps_expiry() {
        let result: Result<(), String> = with_deadline(
            Duration::from_millis(10),
            async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            },
            |d| format!("expired after {}ms", d.as_millis()),
        )
        .await;
        assert_eq!(result, Err("expired after 10ms".to_string()));
    }

    #[tokio::test]
    async fn test_deadline_passes_through_result() {
        let result: Result<u8, String> =
            with_deadline(Duration::from_secs(1), async { Err("boom".to_string()) }, |_| {
                "late".to_string()
            })
            .await;
        assert_eq!(result, Err("boom".to_string()));
    }
}
