//! Rig configuration
//!
//! Loaded from a YAML file; every field has a default so an empty file is a valid
//! configuration. A few environment variables override the file afterwards:
//!
//! - `REDIS_HOST` replaces the host of `cache.url`
//! - `SIMRIG_FRAMERATE` replaces `framerate`
//! - `SIMRIG_LOG` replaces `log_filter`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::lights::DRGB_MAX_PIXELS;
use crate::types::{DriverSession, TickRate, period_of};
use crate::{Result, RigError};

/// Top-level rig configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Synchronization loop frequency in Hz
    pub framerate: f64,
    /// LEDs on the strip
    pub pixel_count: usize,
    /// Mapper calibration used until telemetry reports a car
    pub idle_rpm: f64,
    pub redline_rpm: f64,
    pub cache: CacheConfig,
    pub lights: LightsConfig,
    pub telemetry: TelemetryConfig,
    pub log_filter: String,
    /// Drivers seeded into the in-memory store
    pub drivers: Vec<DriverSession>,
    pub active_driver: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub url: String,
    /// Bound on every cache connect and command
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightsConfig {
    pub host: String,
    pub port: u16,
    /// Seconds WLED holds the last realtime frame
    pub hold_secs: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Recording to play back
    pub replay: Option<PathBuf>,
    pub replay_hz: f64,
    pub loop_playback: bool,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            framerate: 30.0,
            pixel_count: 60,
            idle_rpm: 1000.0,
            redline_rpm: 7000.0,
            cache: CacheConfig::default(),
            lights: LightsConfig::default(),
            telemetry: TelemetryConfig::default(),
            log_filter: "info".to_string(),
            drivers: Vec::new(),
            active_driver: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { url: "redis://127.0.0.1:6379/".to_string(), timeout_ms: 250 }
    }
}

impl Default for LightsConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 21324, hold_secs: 2 }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { replay: None, replay_hz: 60.0, loop_playback: false }
    }
}

impl RigConfig {
    /// Load, apply environment overrides, and validate.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RigError::file_error(path.to_path_buf(), e))?;
        let mut config = Self::from_yaml(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;

        debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(contents)
            .map_err(|e| RigError::config(format!("configuration parse failed: {}", e)))
    }

    /// Apply overrides from a variable lookup, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("REDIS_HOST").filter(|h| !h.trim().is_empty()) {
            self.cache.url = replace_host(&self.cache.url, host.trim());
        }
        if let Some(rate) = lookup("SIMRIG_FRAMERATE") {
            self.framerate = rate
                .trim()
                .parse()
                .map_err(|_| RigError::config(format!("SIMRIG_FRAMERATE is not a number: {}", rate)))?;
        }
        if let Some(filter) = lookup("SIMRIG_LOG") {
            self.log_filter = filter;
        }
        Ok(())
    }

    /// Check value ranges, naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        TickRate::new(self.framerate)?;

        if self.pixel_count == 0 || self.pixel_count > DRGB_MAX_PIXELS {
            return Err(RigError::config(format!(
                "pixel_count must be between 1 and {}, got {}",
                DRGB_MAX_PIXELS, self.pixel_count
            )));
        }
        if !(self.idle_rpm.is_finite() && self.redline_rpm.is_finite()) || self.idle_rpm < 0.0 {
            return Err(RigError::config("idle_rpm and redline_rpm must be finite and non-negative"));
        }
        if self.cache.timeout_ms == 0 {
            return Err(RigError::config("cache.timeout_ms must be greater than zero"));
        }
        if period_of(self.telemetry.replay_hz).is_none() {
            return Err(RigError::config("telemetry.replay_hz must be positive with a representable period"));
        }
        if let Some(id) = self.active_driver {
            if !self.drivers.iter().any(|d| d.id == id) {
                return Err(RigError::config(format!("active_driver {} is not in drivers", id)));
            }
        }
        Ok(())
    }

    pub fn tick_rate(&self) -> Result<TickRate> {
        TickRate::new(self.framerate)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache.timeout_ms)
    }

    /// `host:port` of the light controller
    pub fn lights_address(&self) -> String {
        format!("{}:{}", self.lights.host, self.lights.port)
    }
}

// Swap the host portion of a redis:// URL, keeping scheme, credentials, port and db.
fn replace_host(url: &str, host: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("redis", url));
    let (authority, path) = match rest.find('/') {
        Some(idx) => rest.split_at(idx),
        None => (rest, ""),
    };
    let (credentials, host_port) = match authority.rsplit_once('@') {
        Some((creds, hp)) => (Some(creds), hp),
        None => (None, authority),
    };
    let port = host_port.rsplit_once(':').map(|(_, port)| port);

    let mut rebuilt = format!("{}://", scheme);
    if let Some(creds) = credentials {
        rebuilt.push_str(creds);
        rebuilt.push('@');
    }
    rebuilt.push_str(host);
    if let Some(port) = port {
        rebuilt.push(':');
        rebuilt.push_str(port);
    }
    rebuilt.push_str(path);
    rebuilt
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_file_is_default() {
        let config = RigConfig::from_yaml("").unwrap();
        assert_eq!(config, RigConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = RigConfig::from_yaml(
            "framerate: 60\nlights:\n  host: wled.local\ndrivers:\n  - id: 1\n    name: Alice\nactive_driver: 1\n",
        )
        .unwrap();

        assert_eq!(config.framerate, 60.0);
        assert_eq!(config.lights.host, "wled.local");
        assert_eq!(config.lights.port, 21324);
        assert_eq!(config.drivers[0].track_time, 0.0);
        assert_eq!(config.lights_address(), "wled.local:21324");
        config.validate().unwrap();
    }

    #[test]
    fn unparsable_file_is_config_error() {
        assert!(matches!(RigConfig::from_yaml("framerate: [fast"), Err(RigError::Config { .. })));
    }

    #[test]
    fn validation_names_the_field() {
        let mut config = RigConfig { framerate: 0.0, ..RigConfig::default() };
        assert!(config.validate().unwrap_err().to_string().contains("framerate"));

        config.framerate = 30.0;
        config.pixel_count = 0;
        assert!(config.validate().unwrap_err().to_string().contains("pixel_count"));

        config.pixel_count = 60;
        config.active_driver = Some(7);
        assert!(config.validate().unwrap_err().to_string().contains("active_driver"));
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> =
            [("REDIS_HOST", "cache.lan"), ("SIMRIG_FRAMERATE", "45"), ("SIMRIG_LOG", "debug")]
                .into_iter()
                .collect();

        let mut config = RigConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string())).unwrap();

        assert_eq!(config.cache.url, "redis://cache.lan:6379/");
        assert_eq!(config.framerate, 45.0);
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn bad_framerate_override_is_rejected() {
        let mut config = RigConfig::default();
        let result = config.apply_overrides(|name| (name == "SIMRIG_FRAMERATE").then(|| "fast".to_string()));
        assert!(result.is_err());
    }

    #[test]
    fn rates_without_a_period_fail_validation() {
        let mut config = RigConfig { framerate: 1e-30, ..RigConfig::default() };
        assert!(matches!(config.validate(), Err(RigError::Config { .. })));

        config.framerate = 30.0;
        config.telemetry.replay_hz = 1e-30;
        assert!(matches!(config.validate(), Err(RigError::Config { .. })));
    }

    #[test]
    fn host_replacement_keeps_other_parts() {
        assert_eq!(replace_host("redis://:secret@old:6380/2", "new"), "redis://:secret@new:6380/2");
        assert_eq!(replace_host("redis://old", "new"), "redis://new");
    }
}
