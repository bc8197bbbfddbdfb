//! Sim-racing rig manager.
//!
//! simrig keeps an addressable LED strip in step with a running racing simulator
//! and shares session state with the rest of the rig through a key/value cache.
//!
//! # Features
//!
//! - **Synchronization loop**: polls telemetry at a fixed rate, drives an RPM
//!   colour ramp on the lights and records best laps per driver
//! - **Shared state**: the latest snapshot, active driver and session best are
//!   published to Redis for other processes
//! - **Degrades gracefully**: an unreachable cache never stops the loop
//! - **Replay**: recorded sessions play back on any platform
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use simrig::cache::{MemoryBackend, SharedStateCache};
//! use simrig::lights::WledController;
//! use simrig::persistence::MemoryStore;
//! use simrig::telemetry::ReplaySource;
//! use simrig::{RpmStrip, SyncLoop, SyncWorker, TickRate};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = ReplaySource::open("session.yaml", 60.0, false)?;
//!     let lights = WledController::new("192.168.1.50:21324", 60, 2);
//!     let cache = SharedStateCache::new(MemoryBackend::new());
//!     let store = Arc::new(MemoryStore::new());
//!
//!     let sync = SyncLoop::new(
//!         source,
//!         lights,
//!         RpmStrip::new(60, 1000.0, 7000.0),
//!         cache,
//!         store,
//!         TickRate::new(30.0)?,
//!     );
//!     let mut handle = SyncWorker::spawn(sync);
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.stop();
//!     handle.wait().await;
//!     Ok(())
//! }
//! ```

mod error;
pub mod types;

pub mod cache;
pub mod channels;
pub mod config;
pub mod control;
pub mod lights;
pub mod logging;
pub mod mapper;
pub mod persistence;
pub mod sync;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use error::*;
pub use types::*;

pub use cache::SharedStateCache;
pub use channels::{ChannelRegistry, RigMessage};
pub use config::RigConfig;
pub use control::RigControl;
pub use mapper::{RpmMapper, RpmStrip};
pub use sync::{LoopExit, LoopState, Pace, SyncHandle, SyncLoop, SyncWorker};
