//! Lap record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lap record before it has been persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLapRecord {
    pub car: String,
    pub track_name: String,
    /// Empty string when the track has a single layout
    pub track_config: String,
    /// Lap time in seconds
    pub time: f64,
    pub driver_id: i64,
}

/// A persisted best lap. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LapRecord {
    pub id: i64,
    pub car: String,
    pub track_name: String,
    pub track_config: String,
    pub time: f64,
    pub driver_id: i64,
    pub set_at: DateTime<Utc>,
}

impl LapRecord {
    /// Materialise a new record with its storage id and creation timestamp.
    pub fn from_new(id: i64, new: NewLapRecord, set_at: DateTime<Utc>) -> Self {
        Self {
            id,
            car: new.car,
            track_name: new.track_name,
            track_config: new.track_config,
            time: new.time,
            driver_id: new.driver_id,
            set_at,
        }
    }
}
