//! Light controller trait

mod wled;

pub use wled::{DRGB_MAX_PIXELS, WledController};

use crate::Result;
use crate::types::ColorSequence;

/// Addressable LED controller driven by the synchronization loop.
#[async_trait::async_trait]
pub trait LightController: Send + 'static {
    fn is_connected(&self) -> bool;

    /// Open the connection to the controller.
    async fn connect(&mut self) -> Result<()>;

    /// Drop any existing connection and open a fresh one.
    async fn reconnect(&mut self) -> Result<()>;

    /// Blank the strip and release the controller.
    async fn stop(&mut self) -> Result<()>;

    /// Push one frame of pixel colours.
    async fn update(&mut self, colors: &ColorSequence) -> Result<()>;
}
