//! Core data model shared by the loop, the cache and the request layer.
//!
//! - [`TelemetrySnapshot`] is one poll of simulator state
//! - [`DriverSession`] / [`ActiveDriver`] identify who lap records belong to
//! - [`LapRecord`] is an immutable best-lap fact
//! - [`ColorSequence`] is one frame for the LED strip
//! - [`TickRate`] is the loop frequency

mod color;
mod driver;
mod lap;
mod snapshot;
mod tick_rate;

pub use color::{ColorSequence, Rgb};
pub use driver::{ActiveDriver, DriverSession};
pub use lap::{LapRecord, NewLapRecord};
pub use snapshot::{SnapshotForm, TelemetrySnapshot};
pub use tick_rate::{TickRate, period_of};
