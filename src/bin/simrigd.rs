//! Rig manager daemon: replays telemetry onto a WLED strip and shares state through Redis

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

use simrig::cache::RedisBackend;
use simrig::channels::ACTIVE_DRIVER_CHANNEL;
use simrig::lights::{LightController, WledController};
use simrig::persistence::MemoryStore;
use simrig::telemetry::ReplaySource;
use simrig::{
    ChannelRegistry, LoopExit, RigConfig, RigControl, RpmStrip, SharedStateCache, SyncLoop,
    SyncWorker, logging,
};

#[derive(Parser)]
#[command(name = "simrigd")]
#[command(about = "Drive rig lights from simulator telemetry and record best laps")]
struct Args {
    /// YAML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter, overrides the configured one (RUST_LOG still wins)
    #[arg(short, long)]
    log: Option<String>,
}

fn load_config(path: Option<&PathBuf>) -> Result<RigConfig> {
    match path {
        Some(path) => {
            RigConfig::load(path).with_context(|| format!("loading configuration {}", path.display()))
        }
        None => {
            let mut config = RigConfig::default();
            config.apply_overrides(|name| std::env::var(name).ok())?;
            config.validate()?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;

    let filter = args.log.as_deref().unwrap_or(&config.log_filter);
    logging::init_tracing(filter)?;

    let Some(recording) = config.telemetry.replay.as_ref() else {
        bail!("no telemetry source configured, set telemetry.replay");
    };
    let source = ReplaySource::open(recording, config.telemetry.replay_hz, config.telemetry.loop_playback)
        .context("opening telemetry recording")?;

    let cache = SharedStateCache::new(RedisBackend::new(&config.cache.url, config.cache_timeout())?);
    let store = Arc::new(MemoryStore::with_drivers(config.drivers.clone(), None)?);
    let channels = Arc::new(ChannelRegistry::new());
    channels.open(ACTIVE_DRIVER_CHANNEL);

    let control = RigControl::new(store.clone(), cache.clone(), channels.clone());
    if let Some(driver_id) = config.active_driver {
        control.select_driver(driver_id).await?;
    }

    let mut lights =
        WledController::new(config.lights_address(), config.pixel_count, config.lights.hold_secs);
    if let Err(e) = lights.connect().await {
        warn!(error = %e, "Light controller unavailable, retrying every tick on track");
    }

    let sync = SyncLoop::new(
        source,
        lights,
        RpmStrip::new(config.pixel_count, config.idle_rpm, config.redline_rpm),
        cache.clone(),
        store,
        config.tick_rate()?,
    )
    .with_channels(channels.clone());

    info!(framerate = config.framerate, cache = %config.cache.url, "simrigd starting");
    let mut handle = SyncWorker::spawn(sync);

    let finished = tokio::select! {
        exit = handle.wait() => Some(exit),
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                warn!(error = %e, "Failed to listen for interrupt");
            }
            None
        }
    };
    let exit = match finished {
        Some(exit) => exit,
        None => {
            info!("Interrupt received, shutting down");
            handle.stop();
            handle.wait().await
        }
    };

    channels.close_all();
    cache.close().await;

    match exit {
        LoopExit::Stopped => {
            info!("simrigd stopped");
            Ok(())
        }
        LoopExit::Failed(e) => {
            for suggestion in e.recovery_suggestions() {
                error!("  - {}", suggestion);
            }
            Err(e).context("synchronization loop failed")
        }
    }
}
