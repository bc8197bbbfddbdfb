//! Telemetry to hardware synchronization loop
//!
//! One [`SyncLoop`] owns the telemetry source, the light controller and the RPM
//! mapper. Each tick it publishes the latest snapshot, reconciles the active
//! driver, drives the LED strip while the car is on track and records new best
//! laps. Everything other processes need to see leaves through the shared cache.
//!
//! ```text
//! INITIALIZING ──> RUNNING <──> WAITING
//!                     │            │
//!                     └──> STOPPED <┘
//! ```
//!
//! [`SyncWorker::spawn`] runs a loop on its own task and hands back a
//! [`SyncHandle`] for observing and stopping it.

mod worker;


pub use worker::{SyncHandle, SyncWorker};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::cache::SharedStateCache;
use crate::channels::{ACTIVE_DRIVER_CHANNEL, ChannelRegistry, RigMessage};
use crate::lights::LightController;
use crate::mapper::{RpmMapper, RpmStrip};
use crate::persistence::Persistence;
use crate::telemetry::TelemetrySource;
use crate::types::{ActiveDriver, LapRecord, NewLapRecord, SnapshotForm, TelemetrySnapshot, TickRate};
use crate::{FailureClass, Result, RigError};

/// Pause between ticks while waiting for telemetry.
pub const WAITING_BACKOFF: Duration = Duration::from_secs(1);

/// Lifecycle state of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Initializing,
    /// On track, driving the lights
    Running,
    /// Telemetry inactive or car off track
    Waiting,
    /// Terminal
    Stopped,
}

/// How long to pause after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pace {
    /// Sleep out the rest of the tick period
    Frame,
    /// Sleep the fixed waiting backoff
    Backoff,
}

/// Why the loop ended.
#[derive(Debug)]
pub enum LoopExit {
    /// Stop was requested
    Stopped,
    /// A fatal error ended the loop
    Failed(RigError),
}

impl LoopExit {
    pub fn is_failure(&self) -> bool {
        matches!(self, LoopExit::Failed(_))
    }
}

/// The synchronization loop and the state it owns.
pub struct SyncLoop<S, L, M = RpmStrip> {
    source: S,
    lights: L,
    mapper: M,
    cache: SharedStateCache,
    store: Arc<dyn Persistence>,
    channels: Option<Arc<ChannelRegistry<RigMessage>>>,
    tick_rate: TickRate,

    state: LoopState,
    state_tx: watch::Sender<LoopState>,
    driver: Option<ActiveDriver>,
    /// Accumulated on-track seconds of the active driver
    track_time: f64,
    /// Best lap seen since the car last left the track, 0 when none
    session_best_lap: f64,
}

impl<S, L, M> SyncLoop<S, L, M>
where
    S: TelemetrySource,
    L: LightController,
    M: RpmMapper,
{
    pub fn new(
        source: S,
        lights: L,
        mapper: M,
        cache: SharedStateCache,
        store: Arc<dyn Persistence>,
        tick_rate: TickRate,
    ) -> Self {
        let (state_tx, _) = watch::channel(LoopState::Initializing);
        Self {
            source,
            lights,
            mapper,
            cache,
            store,
            channels: None,
            tick_rate,
            state: LoopState::Initializing,
            state_tx,
            driver: None,
            track_time: 0.0,
            session_best_lap: 0.0,
        }
    }

    /// Also listen for driver notifications on the registry's active driver channel.
    pub fn with_channels(mut self, channels: Arc<ChannelRegistry<RigMessage>>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Receiver observing every state transition.
    pub fn subscribe(&self) -> watch::Receiver<LoopState> {
        self.state_tx.subscribe()
    }

    pub fn active_driver(&self) -> Option<&ActiveDriver> {
        self.driver.as_ref()
    }

    pub fn track_time(&self) -> f64 {
        self.track_time
    }

    pub fn session_best_lap(&self) -> f64 {
        self.session_best_lap
    }

    pub fn tick_rate(&self) -> TickRate {
        self.tick_rate
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn lights(&self) -> &L {
        &self.lights
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            debug!("Loop state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    /// Load the active driver from persistence. No driver simply disables recording.
    pub async fn initialize(&mut self) -> Result<()> {
        self.set_state(LoopState::Initializing);

        match self.store.active_driver_session().await? {
            Some(driver) => {
                info!(driver_id = driver.id, "Logging data for {}", driver.name);
                self.track_time = driver.track_time;
                self.driver = Some(ActiveDriver::unversioned(driver));
            }
            None => info!("No driver selected. Lap times will not be recorded."),
        }

        self.set_state(LoopState::Running);
        Ok(())
    }

    /// Run one tick and report how long to pause before the next.
    pub async fn step(&mut self) -> Result<Pace> {
        let decorated = self.source.latest(SnapshotForm::Decorated).await?;
        let raw = self.source.latest(SnapshotForm::Raw).await?;
        self.cache.publish_snapshot(&decorated, &raw).await;

        self.reconcile_driver().await?;

        // Payloads of an inactive source are never interpreted
        let snapshot = if self.source.is_active() {
            Some(TelemetrySnapshot::from_value(&decorated)?)
        } else {
            None
        };

        let Some(snapshot) = snapshot.filter(|s| s.is_on_track) else {
            self.wait().await?;
            return Ok(Pace::Backoff);
        };

        self.drive(&snapshot).await;
        self.check_best_lap(&snapshot).await?;
        trace!(?snapshot, "Tick complete");

        Ok(Pace::Frame)
    }

    /// Drive ticks until cancelled or a fatal error occurs.
    ///
    /// Cancellation is honoured between ticks; a tick in progress always completes.
    pub async fn run(mut self, cancel: CancellationToken) -> LoopExit {
        if let Err(e) = self.initialize().await {
            return self.fail(e).await;
        }

        loop {
            if cancel.is_cancelled() {
                return self.halt();
            }

            let started = Instant::now();
            let deadline = match self.step().await {
                Ok(Pace::Frame) => started + self.tick_rate.period(),
                Ok(Pace::Backoff) => Instant::now() + WAITING_BACKOFF,
                Err(e) if e.failure_class() == FailureClass::Transient => {
                    error!(error = %e.chain(), "Transient failure, continuing with next tick");
                    started + self.tick_rate.period()
                }
                Err(e) => return self.fail(e).await,
            };

            tokio::select! {
                _ = cancel.cancelled() => return self.halt(),
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }
    }

    /// Pick up driver selections made elsewhere.
    ///
    /// The cache is authoritative; a channel notification stands in when the
    /// cache has nothing, and persistence is the last resort.
    async fn reconcile_driver(&mut self) -> Result<()> {
        let notified = self
            .channels
            .as_ref()
            .and_then(|channels| channels.drain(ACTIVE_DRIVER_CHANNEL).into_iter().last())
            .map(|message| match message {
                RigMessage::ActiveDriverChanged(entry) => entry,
            });

        let candidate = match self.cache.active_driver().await {
            Some(entry) => Some(entry),
            None => match notified {
                Some(entry) => Some(entry),
                None => self.store.active_driver_session().await?.map(ActiveDriver::unversioned),
            },
        };

        let Some(incoming) = candidate else {
            if let Some(cleared) = self.driver.take() {
                info!(driver_id = cleared.driver.id, "Active driver cleared. Lap times will not be recorded.");
            }
            return Ok(());
        };

        let handoff = self.driver.as_ref().is_none_or(|current| current.is_handoff_to(&incoming));
        if handoff {
            info!(
                driver_id = incoming.driver.id,
                version = ?incoming.version,
                "Setting active driver to {}", incoming.driver.name
            );
            self.track_time = incoming.driver.track_time;
            self.driver = Some(incoming);
        } else if let Some(current) = self.driver.as_mut() {
            // Adopt the published version of a session loaded from persistence
            if current.version.is_none() {
                current.version = incoming.version;
            }
        }
        Ok(())
    }

    async fn wait(&mut self) -> Result<()> {
        self.set_state(LoopState::Waiting);
        self.session_best_lap = 0.0;

        if let Some(active) = self.driver.as_mut() {
            if active.driver.track_time < self.track_time.floor() {
                info!(driver_id = active.driver.id, "Updating track time for {}", active.driver.name);
                active.driver =
                    self.store.update_driver_track_time(active.driver.id, self.track_time).await?;
            }
        }

        if self.lights.is_connected() {
            if let Err(e) = self.lights.stop().await {
                error!(error = %e.chain(), "Failed to stop light controller");
            }
            info!("Telemetry lost - waiting");
        }

        self.source.restart().await
    }

    async fn drive(&mut self, snapshot: &TelemetrySnapshot) {
        self.set_state(LoopState::Running);

        // Car swaps change the calibration
        if self.mapper.redline() != snapshot.redline {
            self.mapper.set_redline(snapshot.redline);
        }
        if self.mapper.idle_rpm() != snapshot.idle_rpm {
            self.mapper.set_idle_rpm(snapshot.idle_rpm);
        }
        self.mapper.set_rpm(snapshot.rpm);

        // A lost controller skips this frame; the next tick reconnects
        if let Err(e) = self.show_rpm().await {
            error!(error = %e.chain(), "Light controller update failed");
        }

        self.track_time += self.tick_rate.period_secs();
    }

    async fn show_rpm(&mut self) -> Result<()> {
        if !self.lights.is_connected() {
            info!("Reconnecting light controller");
            self.lights.reconnect().await?;
        }
        let colors = self.mapper.to_color_sequence();
        self.lights.update(&colors).await
    }

    async fn check_best_lap(&mut self, snapshot: &TelemetrySnapshot) -> Result<Option<LapRecord>> {
        let lap = snapshot.best_lap_time;
        let improved = lap > 0.0 && (self.session_best_lap == 0.0 || lap < self.session_best_lap);
        if !improved {
            return Ok(None);
        }
        self.session_best_lap = lap;

        let Some(active) = self.driver.as_ref() else {
            debug!(time = lap, "New session best with no active driver, not recorded");
            return Ok(None);
        };

        info!(driver_id = active.driver.id, time = lap, "Setting new best lap time for {}", active.driver.name);
        let record = self
            .store
            .create_lap_record(NewLapRecord {
                car: snapshot.car_name.clone(),
                track_name: snapshot.track_name.clone(),
                track_config: snapshot.track_config_or_default().to_string(),
                time: lap,
                driver_id: active.driver.id,
            })
            .await?;

        self.cache.set_session_best_lap(&record).await;
        Ok(Some(record))
    }

    fn halt(&mut self) -> LoopExit {
        info!("Stop requested - synchronization loop exiting");
        self.set_state(LoopState::Stopped);
        LoopExit::Stopped
    }

    async fn fail(&mut self, err: RigError) -> LoopExit {
        match &err {
            RigError::MalformedTelemetry { .. } => {
                error!(error = %err.chain(), "Required data not found - stopping telemetry stream")
            }
            RigError::TelemetryRefused { .. } => {
                error!(error = %err.chain(), "Simulator refused connection")
            }
            _ => error!(error = %err.chain(), "Unhandled condition - stopping telemetry stream"),
        }

        if let Err(stop_err) = self.source.stop().await {
            warn!(error = %stop_err, "Failed to stop telemetry source");
        }
        self.set_state(LoopState::Stopped);
        LoopExit::Failed(err)
    }
}
