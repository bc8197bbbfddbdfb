//! Persistence boundary for drivers and lap records

mod memory;

pub use memory::MemoryStore;

use crate::Result;
use crate::types::{DriverSession, LapRecord, NewLapRecord};

/// Durable storage consumed by the loop and the request layer.
///
/// At most one driver session is active at any time.
#[async_trait::async_trait]
pub trait Persistence: Send + Sync + 'static {
    /// The currently selected driver, if any
    async fn active_driver_session(&self) -> Result<Option<DriverSession>>;

    async fn driver(&self, driver_id: i64) -> Result<DriverSession>;

    /// Make `driver_id` the single active driver.
    async fn set_active_driver(&self, driver_id: i64) -> Result<DriverSession>;

    /// Store accumulated track time. The stored value never decreases.
    async fn update_driver_track_time(&self, driver_id: i64, seconds: f64) -> Result<DriverSession>;

    async fn create_lap_record(&self, record: NewLapRecord) -> Result<LapRecord>;

    async fn lap_records(&self) -> Result<Vec<LapRecord>>;
}
