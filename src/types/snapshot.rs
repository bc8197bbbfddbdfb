//! Telemetry snapshot as reported by the simulator

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Result, RigError};

/// Which rendering of a snapshot to request from a telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotForm {
    /// Normalised field names, the form the loop interprets
    Decorated,
    /// Source-native payload, passed through to consumers untouched
    Raw,
}

/// Point-in-time simulator state.
///
/// Produced fresh on every poll; the loop never mutates one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Player car is on track
    pub is_on_track: bool,
    /// A simulator session is loaded
    #[serde(default)]
    pub session_active: bool,
    /// Current engine speed
    pub rpm: f64,
    /// Idle engine speed of the current car
    pub idle_rpm: f64,
    /// Redline of the current car
    pub redline: f64,
    pub car_name: String,
    pub track_name: String,
    /// Track layout, absent on single-layout tracks
    #[serde(default)]
    pub track_config: Option<String>,
    /// Best lap of the current session in seconds, 0 when none yet
    pub best_lap_time: f64,
}

impl TelemetrySnapshot {
    /// Interpret a decorated payload.
    ///
    /// Any missing or mistyped field yields [`RigError::MalformedTelemetry`] naming
    /// the first offending field.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| RigError::malformed("<root>", "snapshot is not an object"))?;

        for field in REQUIRED_FIELDS {
            if !object.contains_key(*field) {
                return Err(RigError::malformed(*field, "required field not found"));
            }
        }

        serde_json::from_value(value.clone()).map_err(|e| RigError::malformed(field_of(&e), e.to_string()))
    }

    /// Track configuration with absent mapped to the empty string.
    pub fn track_config_or_default(&self) -> &str {
        self.track_config.as_deref().unwrap_or("")
    }
}

const REQUIRED_FIELDS: &[&str] = &[
    "is_on_track",
    "rpm",
    "idle_rpm",
    "redline",
    "car_name",
    "track_name",
    "best_lap_time",
];

// serde_json reports type errors as "invalid type: ..., expected ..." without the
// field name, so fall back to a generic marker.
fn field_of(err: &serde_json::Error) -> String {
    let message = err.to_string();
    message
        .split('`')
        .nth(1)
        .filter(|name| REQUIRED_FIELDS.contains(name))
        .unwrap_or("<payload>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decorated() -> Value {
        json!({
            "is_on_track": true,
            "session_active": true,
            "rpm": 4200.0,
            "idle_rpm": 900.0,
            "redline": 7200.0,
            "car_name": "Mazda MX-5 Cup",
            "track_name": "Lime Rock Park",
            "track_config": null,
            "best_lap_time": 0.0,
        })
    }

    #[test]
    fn parses_decorated_payload() {
        let snapshot = TelemetrySnapshot::from_value(&decorated()).unwrap();
        assert!(snapshot.is_on_track);
        assert_eq!(snapshot.rpm, 4200.0);
        assert_eq!(snapshot.track_config_or_default(), "");
    }

    #[test]
    fn missing_field_is_reported_by_name() {
        let mut value = decorated();
        value.as_object_mut().unwrap().remove("redline");

        match TelemetrySnapshot::from_value(&value) {
            Err(RigError::MalformedTelemetry { field, .. }) => assert_eq!(field, "redline"),
            other => panic!("expected malformed telemetry, got {:?}", other),
        }
    }

    #[test]
    fn mistyped_field_is_malformed() {
        let mut value = decorated();
        value["rpm"] = json!("fast");
        assert!(matches!(
            TelemetrySnapshot::from_value(&value),
            Err(RigError::MalformedTelemetry { .. })
        ));
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(TelemetrySnapshot::from_value(&json!([1, 2, 3])).is_err());
    }

    #[test]
    fn optional_fields_default() {
        let mut value = decorated();
        let object = value.as_object_mut().unwrap();
        object.remove("session_active");
        object.remove("track_config");

        let snapshot = TelemetrySnapshot::from_value(&value).unwrap();
        assert!(!snapshot.session_active);
        assert!(snapshot.track_config.is_none());
    }
}
