//! Request-layer side of the state-sharing contract
//!
//! [`RigControl`] is what an HTTP or UI layer talks to. It reads the snapshot the
//! loop publishes, and it announces driver selections on every path the loop
//! listens to: persistence, the shared cache, and the active driver channel.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

use crate::Result;
use crate::cache::SharedStateCache;
use crate::channels::{ACTIVE_DRIVER_CHANNEL, ChannelRegistry, RigMessage};
use crate::persistence::Persistence;
use crate::types::{ActiveDriver, LapRecord, NewLapRecord, SnapshotForm};

#[derive(Clone)]
pub struct RigControl {
    store: Arc<dyn Persistence>,
    cache: SharedStateCache,
    channels: Arc<ChannelRegistry<RigMessage>>,
}

impl RigControl {
    pub fn new(
        store: Arc<dyn Persistence>,
        cache: SharedStateCache,
        channels: Arc<ChannelRegistry<RigMessage>>,
    ) -> Self {
        Self { store, cache, channels }
    }

    /// Most recent snapshot the loop published, `None` when nothing is cached.
    pub async fn latest_snapshot(&self, form: SnapshotForm) -> Option<Value> {
        self.cache.session_data(form).await
    }

    /// Currently selected driver, from the cache when possible.
    pub async fn active_driver(&self) -> Result<Option<ActiveDriver>> {
        if let Some(entry) = self.cache.active_driver().await {
            return Ok(Some(entry));
        }
        debug!("Active driver not cached, reading persistence");
        Ok(self.store.active_driver_session().await?.map(ActiveDriver::unversioned))
    }

    /// Make `driver_id` the active driver.
    ///
    /// Persistence is updated first; an unknown id fails before anything is
    /// published. The cache write and channel notification are best effort.
    pub async fn select_driver(&self, driver_id: i64) -> Result<ActiveDriver> {
        let driver = self.store.set_active_driver(driver_id).await?;
        let entry = self.cache.set_active_driver(driver).await;

        let notified = self
            .channels
            .send(ACTIVE_DRIVER_CHANNEL, RigMessage::ActiveDriverChanged(entry.clone()));
        info!(driver_id, version = ?entry.version, notified, "Driver selected: {}", entry.driver.name);

        Ok(entry)
    }

    /// Persist a lap and mirror it as the session best.
    pub async fn record_lap(&self, lap: NewLapRecord) -> Result<LapRecord> {
        let record = self.store.create_lap_record(lap).await?;
        self.cache.set_session_best_lap(&record).await;
        Ok(record)
    }

    pub async fn session_best_lap(&self) -> Option<LapRecord> {
        self.cache.session_best_lap().await
    }

    pub async fn lap_records(&self) -> Result<Vec<LapRecord>> {
        self.store.lap_records().await
    }
}
