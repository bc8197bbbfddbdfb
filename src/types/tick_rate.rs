//! Control loop tick rate

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{Result, RigError};

/// Frame rate of the synchronization loop in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct TickRate(f64);

impl TickRate {
    /// Create a tick rate; rejects rates without a usable period.
    pub fn new(hz: f64) -> Result<Self> {
        if period_of(hz).is_none() {
            return Err(RigError::config(format!(
                "framerate must be a positive number with a representable period, got {}",
                hz
            )));
        }
        Ok(Self(hz))
    }

    pub fn hz(self) -> f64 {
        self.0
    }

    /// Length of one tick in seconds
    pub fn period_secs(self) -> f64 {
        1.0 / self.0
    }

    pub fn period(self) -> Duration {
        Duration::from_secs_f64(self.period_secs())
    }
}

/// Period of a rate in Hz, `None` when it is not positive or does not fit a
/// non-zero `Duration`.
pub fn period_of(hz: f64) -> Option<Duration> {
    if !hz.is_finite() || hz <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(1.0 / hz).ok().filter(|period| !period.is_zero())
}

impl TryFrom<f64> for TickRate {
    type Error = RigError;

    fn try_from(hz: f64) -> Result<Self> {
        TickRate::new(hz)
    }
}

impl From<TickRate> for f64 {
    fn from(rate: TickRate) -> f64 {
        rate.0
    }
}
