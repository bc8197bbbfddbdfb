//! Shared state cache
//!
//! The cache is the only channel through which loop state becomes visible to other
//! processes. Reads and writes degrade instead of failing: an unreachable store turns
//! writes into logged no-ops and reads into "absent", so the control loop keeps
//! driving hardware while the cache is down.
//!
//! # Example
//!
//! ```rust
//! use simrig::cache::{MemoryBackend, SharedStateCache, keys};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let backend = MemoryBackend::new();
//! let cache = SharedStateCache::new(backend.clone());
//!
//! assert!(cache.set(keys::SESSION_DATA, "{}".to_string()).await);
//!
//! backend.set_reachable(false);
//! assert!(!cache.set(keys::SESSION_DATA, "{}".to_string()).await);
//! assert_eq!(cache.get(keys::SESSION_DATA).await, None);
//! # }
//! ```

mod memory;
mod redis;

pub use self::memory::MemoryBackend;
pub use self::redis::RedisBackend;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, warn};

use crate::Result;
use crate::types::{ActiveDriver, DriverSession, LapRecord, SnapshotForm};

/// Cache keys shared with the request layer.
pub mod keys {
    /// Latest snapshot, decorated form
    pub const SESSION_DATA: &str = "session_data";
    /// Latest snapshot, raw form
    pub const SESSION_DATA_RAW: &str = "session_data_raw";
    /// Selected driver with selection version
    pub const ACTIVE_DRIVER: &str = "active_driver";
    /// Most recently recorded best lap
    pub const SESSION_BEST_LAP: &str = "session_best_lap";

    /// Key holding the snapshot in the given form.
    pub fn session_data(form: crate::types::SnapshotForm) -> &'static str {
        match form {
            crate::types::SnapshotForm::Decorated => SESSION_DATA,
            crate::types::SnapshotForm::Raw => SESSION_DATA_RAW,
        }
    }
}

/// Transport to a key/value store. Implementations report failures; the
/// [`SharedStateCache`] wrapper decides how to degrade.
#[async_trait::async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    async fn set(&self, key: &str, value: String) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Release any held connection.
    async fn close(&self) {}
}

/// Degrade-to-absent client for the shared state cache.
///
/// Clones share the backend and the highest `active_driver` version this
/// process has read or written.
#[derive(Clone)]
pub struct SharedStateCache {
    backend: Arc<dyn CacheBackend>,
    last_version: Arc<AtomicU64>,
}

impl std::fmt::Debug for SharedStateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStateCache").finish_non_exhaustive()
    }
}

impl SharedStateCache {
    pub fn new<B: CacheBackend>(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    pub fn from_arc(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend, last_version: Arc::default() }
    }

    /// Store a serialized value. Returns whether the write reached the store;
    /// failures are logged, never raised.
    pub async fn set(&self, key: &str, value: String) -> bool {
        match self.backend.set(key, value).await {
            Ok(()) => true,
            Err(e) => {
                error!(key, error = %e, "Cache server refused write");
                false
            }
        }
    }

    /// Fetch a serialized value. Unreachable stores read as absent.
    pub async fn get(&self, key: &str) -> Option<String> {
        match self.backend.get(key).await {
            Ok(value) => value,
            Err(e) => {
                error!(key, error = %e, "Cache server refused read");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(encoded) => self.set(key, encoded).await,
            Err(e) => {
                error!(key, error = %e, "Failed to encode cache value");
                false
            }
        }
    }

    /// Fetch and decode a JSON value. Undecodable payloads read as absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Ignoring undecodable cache entry");
                None
            }
        }
    }

    /// Publish both renderings of the latest snapshot.
    pub async fn publish_snapshot(&self, decorated: &Value, raw: &Value) -> bool {
        let decorated_ok = self.set_json(keys::SESSION_DATA, decorated).await;
        let raw_ok = self.set_json(keys::SESSION_DATA_RAW, raw).await;
        decorated_ok && raw_ok
    }

    /// Latest published snapshot in the requested form.
    pub async fn session_data(&self, form: SnapshotForm) -> Option<Value> {
        self.get_json(keys::session_data(form)).await
    }

    pub async fn active_driver(&self) -> Option<ActiveDriver> {
        let entry: ActiveDriver = self.get_json(keys::ACTIVE_DRIVER).await?;
        if let Some(version) = entry.version {
            self.last_version.fetch_max(version, Ordering::Relaxed);
        }
        Some(entry)
    }

    /// Publish a new driver selection, bumping the selection version.
    ///
    /// The next version follows the larger of the stored version and the last
    /// one this process saw, so a selection made while the store is unreachable
    /// still moves past every earlier one. A process that has never seen the
    /// key starts at 1. The returned entry carries the version that was (or
    /// would have been) written.
    pub async fn set_active_driver(&self, driver: DriverSession) -> ActiveDriver {
        let stored = self.active_driver().await.and_then(|entry| entry.version).unwrap_or(0);
        let version = stored.max(self.last_version.load(Ordering::Relaxed)) + 1;
        self.last_version.fetch_max(version, Ordering::Relaxed);

        let entry = ActiveDriver::versioned(driver, version);
        if self.set_json(keys::ACTIVE_DRIVER, &entry).await {
            debug!(driver_id = entry.driver.id, version, "Active driver published");
        }
        entry
    }

    pub async fn session_best_lap(&self) -> Option<LapRecord> {
        self.get_json(keys::SESSION_BEST_LAP).await
    }

    pub async fn set_session_best_lap(&self, record: &LapRecord) -> bool {
        self.set_json(keys::SESSION_BEST_LAP, record).await
    }

    /// Tear down the backend connection.
    pub async fn close(&self) {
        self.backend.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewLapRecord;
    use serde_json::json;

    fn cache() -> (MemoryBackend, SharedStateCache) {
        let backend = MemoryBackend::new();
        (backend.clone(), SharedStateCache::new(backend))
    }

    #[tokio::test]
    async fn unreachable_write_does_not_raise() {
        let (backend, cache) = cache();
        backend.set_reachable(false);

        let entry = cache.set_active_driver(DriverSession::new(1, "Alice", 0.0)).await;
        assert_eq!(entry.version, Some(1));
        assert_eq!(backend.peek(keys::ACTIVE_DRIVER), None);
    }

    #[tokio::test]
    async fn unreachable_selection_keeps_counting() {
        let (backend, cache) = cache();
        let first = cache.set_active_driver(DriverSession::new(1, "Alice", 0.0)).await;
        assert_eq!(first.version, Some(1));

        backend.set_reachable(false);
        let offline = cache.clone().set_active_driver(DriverSession::new(1, "Alice", 0.0)).await;
        assert_eq!(offline.version, Some(2));

        // The stored entry is still 1, the next write continues from 2
        backend.set_reachable(true);
        let back = cache.set_active_driver(DriverSession::new(2, "Bob", 0.0)).await;
        assert_eq!(back.version, Some(3));
    }

    #[tokio::test]
    async fn unreachable_read_is_absent_not_stale() {
        let (backend, cache) = cache();
        cache.set_active_driver(DriverSession::new(1, "Alice", 0.0)).await;
        assert!(cache.active_driver().await.is_some());

        backend.set_reachable(false);
        assert_eq!(cache.active_driver().await, None);
        assert_eq!(cache.get(keys::ACTIVE_DRIVER).await, None);

        backend.set_reachable(true);
        assert!(cache.active_driver().await.is_some());
    }

    #[tokio::test]
    async fn active_driver_versions_increase() {
        let (_, cache) = cache();
        let first = cache.set_active_driver(DriverSession::new(1, "Alice", 0.0)).await;
        let second = cache.set_active_driver(DriverSession::new(1, "Alice", 0.0)).await;
        let third = cache.set_active_driver(DriverSession::new(2, "Bob", 10.0)).await;

        assert_eq!(first.version, Some(1));
        assert_eq!(second.version, Some(2));
        assert_eq!(third.version, Some(3));
        assert_eq!(cache.active_driver().await, Some(third));
    }

    #[tokio::test]
    async fn plain_driver_entry_reads_unversioned() {
        let (backend, cache) = cache();
        backend.insert(keys::ACTIVE_DRIVER, r#"{"id":4,"name":"Dee","trackTime":3.5}"#);

        let entry = cache.active_driver().await.unwrap();
        assert_eq!(entry.driver.id, 4);
        assert_eq!(entry.version, None);
    }

    #[tokio::test]
    async fn garbage_entries_read_as_absent() {
        let (backend, cache) = cache();
        backend.insert(keys::SESSION_BEST_LAP, "not json");
        assert_eq!(cache.session_best_lap().await, None);
    }

    #[tokio::test]
    async fn snapshot_forms_use_their_keys() {
        let (backend, cache) = cache();
        let decorated = json!({ "rpm": 5000.0 });
        let raw = json!({ "RPM": 5000.0 });

        assert!(cache.publish_snapshot(&decorated, &raw).await);
        assert_eq!(cache.session_data(SnapshotForm::Decorated).await, Some(decorated));
        assert_eq!(cache.session_data(SnapshotForm::Raw).await, Some(raw));
        assert!(backend.peek(keys::SESSION_DATA_RAW).is_some());
    }

    #[tokio::test]
    async fn best_lap_round_trip() {
        let (_, cache) = cache();
        let record = LapRecord::from_new(
            1,
            NewLapRecord {
                car: "Porsche 911 GT3 R".to_string(),
                track_name: "Monza".to_string(),
                track_config: "Combined".to_string(),
                time: 107.9,
                driver_id: 2,
            },
            chrono::Utc::now(),
        );

        assert!(cache.set_session_best_lap(&record).await);
        assert_eq!(cache.session_best_lap().await, Some(record));
    }
}
