//! End-to-end checks of the shared state contract: a replayed session driven
//! through a spawned loop, observed only through the cache, persistence and
//! the request-layer facade.

use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use simrig::cache::{MemoryBackend, keys};
use simrig::channels::ACTIVE_DRIVER_CHANNEL;
use simrig::lights::LightController;
use simrig::persistence::{MemoryStore, Persistence};
use simrig::telemetry::ReplaySource;
use simrig::{
    ChannelRegistry, ColorSequence, DriverSession, LoopExit, RigControl, RpmStrip, SharedStateCache,
    SnapshotForm, SyncLoop, SyncWorker, TickRate,
};

#[derive(Clone, Default)]
struct Strip {
    frames: Arc<Mutex<Vec<ColorSequence>>>,
    connected: Arc<Mutex<bool>>,
}

#[async_trait::async_trait]
impl LightController for Strip {
    fn is_connected(&self) -> bool {
        *self.connected.lock()
    }

    async fn connect(&mut self) -> simrig::Result<()> {
        *self.connected.lock() = true;
        Ok(())
    }

    async fn reconnect(&mut self) -> simrig::Result<()> {
        self.connect().await
    }

    async fn stop(&mut self) -> simrig::Result<()> {
        *self.connected.lock() = false;
        Ok(())
    }

    async fn update(&mut self, colors: &ColorSequence) -> simrig::Result<()> {
        self.frames.lock().push(colors.clone());
        Ok(())
    }
}

fn recording(frames: &[(bool, f64, f64)]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    for (on_track, rpm, best_lap) in frames {
        writeln!(
            file,
            "- is_on_track: {on_track}\n  rpm: {rpm:.1}\n  idle_rpm: 1000.0\n  redline: 7000.0\n  \
             car_name: Skip Barber\n  track_name: Lime Rock\n  track_config: Classic\n  \
             best_lap_time: {best_lap:.1}"
        )
        .unwrap();
    }
    file
}

struct Rig {
    control: RigControl,
    cache: SharedStateCache,
    backend: MemoryBackend,
    store: Arc<MemoryStore>,
    channels: Arc<ChannelRegistry<simrig::RigMessage>>,
    strip: Strip,
}

fn rig() -> Rig {
    let store = Arc::new(
        MemoryStore::with_drivers(
            [DriverSession::new(1, "Alice", 0.0), DriverSession::new(2, "Bob", 30.0)],
            Some(1),
        )
        .unwrap(),
    );
    let backend = MemoryBackend::new();
    let cache = SharedStateCache::new(backend.clone());
    let channels = Arc::new(ChannelRegistry::new());
    channels.open(ACTIVE_DRIVER_CHANNEL);
    let control = RigControl::new(store.clone(), cache.clone(), channels.clone());

    Rig { control, cache, backend, store, channels, strip: Strip::default() }
}

impl Rig {
    fn sync_loop(&self, source: ReplaySource) -> SyncLoop<ReplaySource, Strip> {
        SyncLoop::new(
            source,
            self.strip.clone(),
            RpmStrip::new(16, 1000.0, 7000.0),
            self.cache.clone(),
            self.store.clone(),
            TickRate::new(10.0).unwrap(),
        )
        .with_channels(self.channels.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn replayed_session_records_best_laps() {
    let rig = rig();
    let file = recording(&[
        (false, 0.0, 0.0),
        (true, 7000.0, 0.0),
        (true, 7000.0, 85.2),
        (true, 3000.0, 85.2),
        (true, 6000.0, 80.1),
    ]);
    let source = ReplaySource::open(file.path(), 2.0, false).unwrap();

    let mut handle = SyncWorker::spawn(rig.sync_loop(source));
    tokio::time::sleep(Duration::from_millis(2300)).await;
    handle.stop();
    assert!(matches!(handle.wait().await, LoopExit::Stopped));

    let records = rig.control.lap_records().await.unwrap();
    let times: Vec<f64> = records.iter().map(|r| r.time).collect();
    assert_eq!(times, vec![85.2, 80.1]);
    assert!(records.iter().all(|r| r.driver_id == 1 && r.track_config == "Classic"));

    let best = rig.control.session_best_lap().await.unwrap();
    assert_eq!(best.time, 80.1);

    let snapshot = rig.control.latest_snapshot(SnapshotForm::Decorated).await.unwrap();
    assert_eq!(snapshot["rpm"], 6000.0);
    assert!(!rig.strip.frames.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn selection_reaches_a_running_loop() {
    let rig = rig();
    let file = recording(&[(true, 4000.0, 0.0), (true, 4000.0, 0.0), (true, 4000.0, 0.0), (true, 4500.0, 95.0)]);
    let source = ReplaySource::open(file.path(), 2.0, false).unwrap();

    let mut handle = SyncWorker::spawn(rig.sync_loop(source));
    tokio::time::sleep(Duration::from_millis(250)).await;
    let selected = rig.control.select_driver(2).await.unwrap();
    assert_eq!(selected.version, Some(1));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    handle.stop();
    handle.wait().await;

    let best = rig.control.session_best_lap().await.unwrap();
    assert_eq!((best.driver_id, best.time), (2, 95.0));
    assert_eq!(rig.channels.pending(ACTIVE_DRIVER_CHANNEL), 0);
}

#[tokio::test(start_paused = true)]
async fn loop_survives_cache_outage() {
    let rig = rig();
    rig.backend.set_reachable(false);
    let file = recording(&[(true, 4000.0, 0.0), (true, 5000.0, 72.4)]);
    let source = ReplaySource::open(file.path(), 2.0, false).unwrap();

    let mut handle = SyncWorker::spawn(rig.sync_loop(source));
    tokio::time::sleep(Duration::from_millis(900)).await;
    assert!(!handle.is_finished());
    handle.stop();
    assert!(matches!(handle.wait().await, LoopExit::Stopped));

    let records = rig.store.lap_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(rig.control.latest_snapshot(SnapshotForm::Decorated).await, None);

    rig.backend.set_reachable(true);
    assert!(rig.backend.peek(keys::SESSION_BEST_LAP).is_none());
}
