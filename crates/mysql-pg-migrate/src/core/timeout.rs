//! Deadline wrapper for database calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{MigrateError, Result};

/// Run `fut`, failing with [`MigrateError::Timeout`] if it does not finish
/// within `limit`.
pub async fn with_timeout<T, F>(limit: Duration, operation: impl Into<String>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(MigrateError::timeout(operation, limit)),
    }
}
