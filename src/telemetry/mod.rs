//! Telemetry source trait

mod replay;

pub use replay::{ReplayFrame, ReplaySource};

use serde_json::Value;

use crate::Result;
use crate::types::SnapshotForm;

/// Simulator telemetry as seen by the synchronization loop.
///
/// Calls are expected to return promptly or fail fast; the loop never waits on a
/// source beyond one call. Sources report a refused simulator connection as
/// [`RigError::TelemetryRefused`](crate::RigError::TelemetryRefused) so the loop can
/// tell it apart from other failures.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + 'static {
    /// Current snapshot in the requested form
    ///
    /// The decorated form must deserialize into a
    /// [`TelemetrySnapshot`](crate::TelemetrySnapshot); the raw form is opaque.
    async fn latest(&mut self, form: SnapshotForm) -> Result<Value>;

    /// Whether the source is currently delivering live data
    fn is_active(&self) -> bool;

    /// Re-establish the simulator connection after data was lost.
    async fn restart(&mut self) -> Result<()>;

    /// Stop delivering data until restarted.
    async fn stop(&mut self) -> Result<()>;
}
