//! Redis cache backend

use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::CacheBackend;
use crate::{Result, RigError};

/// Redis-backed cache.
///
/// The connection is opened lazily and dropped after any transport error, so a
/// restarted Redis server is picked up on the next call. Every connect and command
/// is bounded by `timeout`.
pub struct RedisBackend {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    timeout: Duration,
}

impl RedisBackend {
    /// Validate `url` and prepare a client. Does not touch the network.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| RigError::config(format!("invalid cache url '{}': {}", url, e)))?;
        info!(url, timeout_ms = timeout.as_millis() as u64, "Cache client configured");

        Ok(Self { client, connection: Mutex::new(None), timeout })
    }

    async fn connection(&self, operation: &str, key: &str) -> Result<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_ref() {
            return Ok(connection.clone());
        }

        let connection =
            tokio::time::timeout(self.timeout, self.client.get_multiplexed_async_connection())
                .await
                .map_err(|_| {
                    RigError::cache_unreachable(
                        operation,
                        key,
                        format!("connect timed out after {:?}", self.timeout),
                    )
                })?
                .map_err(|e| RigError::cache_unreachable(operation, key, e.to_string()))?;

        debug!("Cache connection established");
        *guard = Some(connection.clone());
        Ok(connection)
    }

    /// Map a command outcome, forgetting the connection on transport failures.
    async fn settle<T>(
        &self,
        operation: &str,
        key: &str,
        outcome: std::result::Result<redis::RedisResult<T>, tokio::time::error::Elapsed>,
    ) -> Result<T> {
        let reason = match outcome {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("command timed out after {:?}", self.timeout),
        };

        *self.connection.lock().await = None;
        Err(RigError::cache_unreachable(operation, key, reason))
    }
}

#[async_trait::async_trait]
impl CacheBackend for RedisBackend {
    async fn set(&self, key: &str, value: String) -> Result<()> {
        let mut connection = self.connection("set", key).await?;
        let outcome = tokio::time::timeout(self.timeout, connection.set::<_, _, ()>(key, value)).await;
        self.settle("set", key, outcome).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection("get", key).await?;
        let outcome =
            tokio::time::timeout(self.timeout, connection.get::<_, Option<String>>(key)).await;
        self.settle("get", key, outcome).await
    }

    async fn close(&self) {
        if self.connection.lock().await.take().is_some() {
            debug!("Cache connection closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_urls() {
        assert!(matches!(
            RedisBackend::new("not a url", Duration::from_millis(100)),
            Err(RigError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_server_reports_cache_error() {
        // Port 1 is reserved and refuses connections on loopback
        let backend = RedisBackend::new("redis://127.0.0.1:1/", Duration::from_millis(200)).unwrap();
        let err = backend.get("session_data").await.unwrap_err();
        assert!(matches!(err, RigError::Cache { .. }));
    }
}
