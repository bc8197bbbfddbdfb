//! Scripted collaborators for exercising the synchronization loop
//!
//! [`ScriptedSource`] replays a fixed list of telemetry steps and
//! [`RecordingLights`] remembers every frame it was asked to show. Both expose a
//! shared log so tests can inspect them after handing ownership to a loop.

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::lights::LightController;
use crate::telemetry::TelemetrySource;
use crate::types::{ColorSequence, SnapshotForm};
use crate::{Result, RigError};

/// Car used by [`frame`].
pub const TEST_CAR: &str = "mx5 mx52016";
/// Track used by [`frame`].
pub const TEST_TRACK: &str = "limerock";

/// Decorated snapshot for the test car with idle 1000 and redline 7000.
pub fn frame(on_track: bool, rpm: f64, best_lap_time: f64) -> Value {
    json!({
        "is_on_track": on_track,
        "session_active": true,
        "rpm": rpm,
        "idle_rpm": 1000.0,
        "redline": 7000.0,
        "car_name": TEST_CAR,
        "track_name": TEST_TRACK,
        "track_config": "full course",
        "best_lap_time": best_lap_time,
    })
}

/// One poll of a [`ScriptedSource`].
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver this decorated payload; `active` is what `is_active` reports.
    Frame { decorated: Value, active: bool },
    /// The simulator refuses the connection.
    Refused,
    /// Any other transport failure.
    Broken,
}

impl Step {
    pub fn active(decorated: Value) -> Self {
        Step::Frame { decorated, active: true }
    }

    pub fn inactive(decorated: Value) -> Self {
        Step::Frame { decorated, active: false }
    }
}

/// What a [`ScriptedSource`] was asked to do.
#[derive(Debug, Default, Clone)]
pub struct SourceLog {
    pub polls: usize,
    pub restarts: usize,
    pub stops: usize,
}

/// Telemetry source that walks through a script, one step per decorated poll.
///
/// Raw polls return the payload of the current step. Once the script runs out
/// the last step repeats.
#[derive(Debug)]
pub struct ScriptedSource {
    steps: Vec<Step>,
    cursor: Option<usize>,
    log: Arc<Mutex<SourceLog>>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps, cursor: None, log: Arc::default() }
    }

    /// Script where every frame is active.
    pub fn from_frames(frames: impl IntoIterator<Item = Value>) -> Self {
        Self::new(frames.into_iter().map(Step::active).collect())
    }

    pub fn log(&self) -> Arc<Mutex<SourceLog>> {
        self.log.clone()
    }

    fn current(&self) -> Option<&Step> {
        self.cursor.and_then(|idx| self.steps.get(idx))
    }
}

#[async_trait::async_trait]
impl TelemetrySource for ScriptedSource {
    async fn latest(&mut self, form: SnapshotForm) -> Result<Value> {
        if form == SnapshotForm::Decorated {
            self.log.lock().polls += 1;
            let last = self.steps.len().saturating_sub(1);
            self.cursor = Some(self.cursor.map_or(0, |idx| (idx + 1).min(last)));
        }

        match self.current() {
            Some(Step::Frame { decorated, .. }) => Ok(decorated.clone()),
            Some(Step::Refused) => Err(RigError::telemetry_refused("connection refused by simulator")),
            Some(Step::Broken) => Err(RigError::telemetry_failed("scripted transport failure")),
            None => Ok(Value::Object(Default::default())),
        }
    }

    fn is_active(&self) -> bool {
        matches!(self.current(), Some(Step::Frame { active: true, .. }))
    }

    async fn restart(&mut self) -> Result<()> {
        self.log.lock().restarts += 1;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.log.lock().stops += 1;
        Ok(())
    }
}

/// What a [`RecordingLights`] was asked to do.
#[derive(Debug, Default, Clone)]
pub struct LightsLog {
    pub connected: bool,
    pub updates: Vec<ColorSequence>,
    pub connects: usize,
    pub reconnects: usize,
    pub stops: usize,
    /// Make every update fail and drop the connection
    pub fail_updates: bool,
}

/// Light controller that records frames instead of sending them.
#[derive(Debug, Default, Clone)]
pub struct RecordingLights {
    log: Arc<Mutex<LightsLog>>,
}

impl RecordingLights {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> Arc<Mutex<LightsLog>> {
        self.log.clone()
    }
}

#[async_trait::async_trait]
impl LightController for RecordingLights {
    fn is_connected(&self) -> bool {
        self.log.lock().connected
    }

    async fn connect(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.connects += 1;
        log.connected = true;
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.reconnects += 1;
        log.connected = true;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        let mut log = self.log.lock();
        log.stops += 1;
        log.connected = false;
        Ok(())
    }

    async fn update(&mut self, colors: &ColorSequence) -> Result<()> {
        let mut log = self.log.lock();
        if log.fail_updates {
            // Mirrors a real controller dropping its socket on a failed send
            log.connected = false;
            return Err(RigError::controller_failed("scripted update failure"));
        }
        log.updates.push(colors.clone());
        Ok(())
    }
}
