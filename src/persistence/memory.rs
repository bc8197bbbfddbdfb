//! In-memory persistence

use chrono::Utc;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

use super::Persistence;
use crate::types::{DriverSession, LapRecord, NewLapRecord};
use crate::{Result, RigError};

#[derive(Debug, Default)]
struct Tables {
    drivers: BTreeMap<i64, DriverSession>,
    active: Option<i64>,
    laps: Vec<LapRecord>,
}

/// Process-local store, used by the daemon and as a test double.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with drivers and an optional active selection.
    pub fn with_drivers(drivers: impl IntoIterator<Item = DriverSession>, active: Option<i64>) -> Result<Self> {
        let store = Self::new();
        {
            let mut tables = store.tables.lock();
            for driver in drivers {
                tables.drivers.insert(driver.id, driver);
            }
            if let Some(id) = active {
                if !tables.drivers.contains_key(&id) {
                    return Err(RigError::not_found("Driver", id));
                }
                tables.active = Some(id);
            }
        }
        Ok(store)
    }

    pub fn insert_driver(&self, driver: DriverSession) {
        self.tables.lock().drivers.insert(driver.id, driver);
    }

    pub fn clear_active_driver(&self) {
        self.tables.lock().active = None;
    }
}

#[async_trait::async_trait]
impl Persistence for MemoryStore {
    async fn active_driver_session(&self) -> Result<Option<DriverSession>> {
        let tables = self.tables.lock();
        Ok(tables.active.and_then(|id| tables.drivers.get(&id).cloned()))
    }

    async fn driver(&self, driver_id: i64) -> Result<DriverSession> {
        self.tables
            .lock()
            .drivers
            .get(&driver_id)
            .cloned()
            .ok_or_else(|| RigError::not_found("Driver", driver_id))
    }

    async fn set_active_driver(&self, driver_id: i64) -> Result<DriverSession> {
        let mut tables = self.tables.lock();
        let driver = tables
            .drivers
            .get(&driver_id)
            .cloned()
            .ok_or_else(|| RigError::not_found("Driver", driver_id))?;
        tables.active = Some(driver_id);
        Ok(driver)
    }

    async fn update_driver_track_time(&self, driver_id: i64, seconds: f64) -> Result<DriverSession> {
        let mut tables = self.tables.lock();
        let driver = tables
            .drivers
            .get_mut(&driver_id)
            .ok_or_else(|| RigError::not_found("Driver", driver_id))?;

        if seconds > driver.track_time {
            driver.track_time = seconds;
        }
        debug!(driver_id, track_time = driver.track_time, "Track time stored");
        Ok(driver.clone())
    }

    async fn create_lap_record(&self, record: NewLapRecord) -> Result<LapRecord> {
        let mut tables = self.tables.lock();
        if !tables.drivers.contains_key(&record.driver_id) {
            return Err(RigError::persistence_failed(
                "create lap record",
                format!("unknown driver {}", record.driver_id),
            ));
        }

        let id = tables.laps.len() as i64 + 1;
        let lap = LapRecord::from_new(id, record, Utc::now());
        tables.laps.push(lap.clone());
        Ok(lap)
    }

    async fn lap_records(&self) -> Result<Vec<LapRecord>> {
        Ok(self.tables.lock().laps.clone())
    }
}
