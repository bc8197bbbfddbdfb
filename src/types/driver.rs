//! Driver session types

use serde::{Deserialize, Serialize};

/// The driver lap records are attributed to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverSession {
    pub id: i64,
    pub name: String,
    /// Accumulated on-track time in seconds
    #[serde(default)]
    pub track_time: f64,
}

impl DriverSession {
    pub fn new(id: i64, name: impl Into<String>, track_time: f64) -> Self {
        Self { id, name: name.into(), track_time }
    }
}

/// A driver session tagged with the selection version it was published under.
///
/// Serialised as the flat `DriverSession` object plus a `version` field, so readers
/// that only know about drivers still decode it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveDriver {
    #[serde(flatten)]
    pub driver: DriverSession,
    /// Selection counter, absent when the session came straight from persistence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
}

impl ActiveDriver {
    pub fn versioned(driver: DriverSession, version: u64) -> Self {
        Self { driver, version: Some(version) }
    }

    pub fn unversioned(driver: DriverSession) -> Self {
        Self { driver, version: None }
    }

    /// Whether `incoming` represents a different selection than `self`.
    ///
    /// Different driver ids always differ. Equal ids differ only when both sides
    /// carry a version and the versions disagree, i.e. the same driver was re-selected.
    pub fn is_handoff_to(&self, incoming: &ActiveDriver) -> bool {
        if self.driver.id != incoming.driver.id {
            return true;
        }
        matches!((self.version, incoming.version), (Some(a), Some(b)) if a != b)
    }
}
