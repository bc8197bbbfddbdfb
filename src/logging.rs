//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::{Result, RigError};

/// Install a formatted tracing subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter` when set. Fails instead of
/// panicking when a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| RigError::config(format!("invalid log filter '{}': {}", default_filter, e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| RigError::config(format!("tracing already initialised: {}", e)))
}
