//! Store call timeouts.
//!
//! Backends have no deadline of their own, so a hung database call would
//! hang the caller. [`TimeoutStore`] bounds every batch.

use super::{Command, Reply, Store, StoreError, StoreResult};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Default timeout for a store batch (5 seconds)
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Execute a store operation with timeout
///
/// # Arguments
///
/// * `duration` - Timeout duration
/// * `future` - Store operation to execute
///
/// # Returns
///
/// * `StoreResult<T>` - Result or `StoreError::Timeout`
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(duration)),
    }
}

/// Store wrapper that fails batches taking longer than `limit`
pub struct TimeoutStore {
    inner: Arc<dyn Store>,
    limit: Duration,
}

impl TimeoutStore {
    pub fn new(inner: Arc<dyn Store>, limit: Duration) -> Self {
        Self { inner, limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl Store for TimeoutStore {
    async fn transaction(&self, commands: Vec<Command>) -> StoreResult<Vec<Reply>> {
        with_timeout(self.limit, self.inner.transaction(commands)).await
    }
}
