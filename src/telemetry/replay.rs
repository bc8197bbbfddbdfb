//! Replay source for recorded telemetry

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tokio::time::{Duration, Instant};
use tracing::{debug, info};

use super::TelemetrySource;
use crate::types::{SnapshotForm, TelemetrySnapshot, period_of};
use crate::{Result, RigError};

/// One recorded frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    #[serde(flatten)]
    pub snapshot: TelemetrySnapshot,
    /// Source-native payload; the decorated fields are served when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

/// Plays back a recording at a fixed rate on the monotonic clock.
///
/// The frame served is chosen by elapsed time since playback started, so polling
/// faster or slower than the recording rate never changes its pace.
pub struct ReplaySource {
    frames: Vec<ReplayFrame>,
    frame_interval: Duration,
    loop_playback: bool,
    started: Instant,
    stopped: bool,
}

impl ReplaySource {
    /// Load a YAML recording: a sequence of frames.
    pub fn open<P: AsRef<Path>>(path: P, rate_hz: f64, loop_playback: bool) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RigError::file_error(path.to_path_buf(), e))?;
        let frames: Vec<ReplayFrame> = serde_yaml_ng::from_str(&contents).map_err(|e| {
            RigError::parse(format!("telemetry recording {}", path.display()), e.to_string())
        })?;

        info!("Opened telemetry recording: {} frames at {}Hz", frames.len(), rate_hz);
        Self::from_frames(frames, rate_hz, loop_playback)
    }

    pub fn from_frames(frames: Vec<ReplayFrame>, rate_hz: f64, loop_playback: bool) -> Result<Self> {
        let Some(frame_interval) = period_of(rate_hz) else {
            return Err(RigError::config(format!(
                "replay rate must be positive with a representable period, got {}",
                rate_hz
            )));
        };

        Ok(Self {
            frames,
            frame_interval,
            loop_playback,
            started: Instant::now(),
            stopped: false,
        })
    }

    pub fn total_frames(&self) -> usize {
        self.frames.len()
    }

    /// Index of the frame due now, `None` once playback has run past the end.
    pub fn current_frame(&self) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        let index = (elapsed / self.frame_interval.as_secs_f64()) as usize;

        if self.loop_playback {
            Some(index % self.frames.len())
        } else if index < self.frames.len() {
            Some(index)
        } else {
            None
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for ReplaySource {
    async fn latest(&mut self, form: SnapshotForm) -> Result<Value> {
        if self.stopped {
            return Err(RigError::telemetry_failed("replay is stopped"));
        }

        // Past the end, keep serving the final frame so consumers see the last state
        let index = self
            .current_frame()
            .or_else(|| self.frames.len().checked_sub(1))
            .ok_or_else(|| RigError::telemetry_failed("recording contains no frames"))?;
        let frame = &self.frames[index];

        match (form, &frame.raw) {
            (SnapshotForm::Raw, Some(raw)) => Ok(raw.clone()),
            _ => Ok(serde_json::to_value(&frame.snapshot)?),
        }
    }

    fn is_active(&self) -> bool {
        !self.stopped && self.current_frame().is_some()
    }

    async fn restart(&mut self) -> Result<()> {
        if self.stopped || self.current_frame().is_none() {
            debug!("Rewinding telemetry recording");
            self.started = Instant::now();
            self.stopped = false;
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        debug!("Replay stopped");
        self.stopped = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const RECORDING: &str = r#"
- is_on_track: false
  rpm: 0.0
  idle_rpm: 900.0
  redline: 7500.0
  car_name: Skip Barber
  track_name: Lime Rock
  best_lap_time: 0.0
- is_on_track: true
  rpm: 5200.0
  idle_rpm: 900.0
  redline: 7500.0
  car_name: Skip Barber
  track_name: Lime Rock
  track_config: Classic
  best_lap_time: 61.2
  raw:
    RPM: 5200.0
    IsOnTrack: true
"#;

    fn write_recording() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(RECORDING.as_bytes()).unwrap();
        file
    }

    #[tokio::test(start_paused = true)]
    async fn plays_frames_at_rate() {
        let file = write_recording();
        let mut source = ReplaySource::open(file.path(), 10.0, false).unwrap();
        assert_eq!(source.total_frames(), 2);

        let first = source.latest(SnapshotForm::Decorated).await.unwrap();
        assert_eq!(first["is_on_track"], false);

        tokio::time::advance(Duration::from_millis(100)).await;
        let second = source.latest(SnapshotForm::Decorated).await.unwrap();
        let snapshot = TelemetrySnapshot::from_value(&second).unwrap();
        assert_eq!(snapshot.track_config.as_deref(), Some("Classic"));

        let raw = source.latest(SnapshotForm::Raw).await.unwrap();
        assert_eq!(raw["RPM"], 5200.0);
    }

    #[tokio::test(start_paused = true)]
    async fn goes_inactive_at_end_and_restart_rewinds() {
        let file = write_recording();
        let mut source = ReplaySource::open(file.path(), 10.0, false).unwrap();

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(!source.is_active());
        // Last frame keeps being served
        assert!(source.latest(SnapshotForm::Decorated).await.is_ok());

        source.restart().await.unwrap();
        assert!(source.is_active());
        assert_eq!(source.current_frame(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn looping_wraps_around() {
        let file = write_recording();
        let source = ReplaySource::open(file.path(), 10.0, true).unwrap();

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(source.is_active());
        assert_eq!(source.current_frame(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_sticky_until_restart() {
        let file = write_recording();
        let mut source = ReplaySource::open(file.path(), 10.0, true).unwrap();

        source.stop().await.unwrap();
        assert!(!source.is_active());
        assert!(source.latest(SnapshotForm::Decorated).await.is_err());

        source.restart().await.unwrap();
        assert!(source.is_active());
    }

    #[test]
    fn invalid_recording_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"- rpm: [oops").unwrap();
        assert!(matches!(ReplaySource::open(file.path(), 60.0, false), Err(RigError::Parse { .. })));
    }

    #[test]
    fn rejects_rates_without_a_period() {
        for rate in [0.0, -10.0, f64::NAN, 1e-30, 1e300] {
            assert!(
                matches!(ReplaySource::from_frames(Vec::new(), rate, false), Err(RigError::Config { .. })),
                "rate {rate} accepted"
            );
        }
    }

    #[test]
    fn missing_recording_is_a_file_error() {
        assert!(matches!(
            ReplaySource::open("/definitely/not/here.yaml", 60.0, false),
            Err(RigError::File { .. })
        ));
    }
}
