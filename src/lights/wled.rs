//! WLED realtime UDP controller

use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use super::LightController;
use crate::types::{ColorSequence, Rgb};
use crate::{Result, RigError};

/// Protocol byte for DRGB realtime frames.
const DRGB: u8 = 2;

/// Pixels that fit in one DRGB datagram.
pub const DRGB_MAX_PIXELS: usize = 490;

/// Upper bound on a single datagram send.
const SEND_TIMEOUT: Duration = Duration::from_millis(100);

/// WLED controller fed with DRGB realtime datagrams.
///
/// Each frame is `[2, hold_secs, r, g, b, ...]`. WLED keeps showing the last frame
/// for `hold_secs` seconds before falling back to its own effects.
pub struct WledController {
    address: String,
    hold_secs: u8,
    pixel_count: usize,
    socket: Option<UdpSocket>,
}

impl WledController {
    pub fn new(address: impl Into<String>, pixel_count: usize, hold_secs: u8) -> Self {
        Self { address: address.into(), hold_secs, pixel_count, socket: None }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Encode one DRGB frame, padding or truncating to the strip length.
    pub fn encode_frame(&self, colors: &ColorSequence, hold_secs: u8) -> Vec<u8> {
        let pixels = self.pixel_count.min(DRGB_MAX_PIXELS);
        let mut packet = Vec::with_capacity(2 + pixels * 3);
        packet.push(DRGB);
        packet.push(hold_secs);

        for index in 0..pixels {
            let px = colors.pixels().get(index).copied().unwrap_or(Rgb::BLACK);
            packet.extend_from_slice(&[px.r, px.g, px.b]);
        }
        packet
    }

    async fn send(&mut self, packet: &[u8]) -> Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| RigError::controller_failed("controller is not connected"))?;

        let outcome = tokio::time::timeout(SEND_TIMEOUT, socket.send(packet)).await;
        match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => {
                self.socket = None;
                Err(RigError::controller_failed_with_source(
                    format!("send to {} failed", self.address),
                    Box::new(e),
                ))
            }
            Err(_) => Err(RigError::controller_failed(format!(
                "send to {} timed out after {:?}",
                self.address, SEND_TIMEOUT
            ))),
        }
    }
}

#[async_trait::async_trait]
impl LightController for WledController {
    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    async fn connect(&mut self) -> Result<()> {
        let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(|e| {
            RigError::controller_failed_with_source("failed to bind UDP socket", Box::new(e))
        })?;
        socket.connect(&self.address).await.map_err(|e| {
            RigError::controller_failed_with_source(
                format!("failed to resolve {}", self.address),
                Box::new(e),
            )
        })?;

        info!(address = %self.address, pixels = self.pixel_count, "Light controller connected");
        self.socket = Some(socket);
        Ok(())
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.socket = None;
        self.connect().await
    }

    async fn stop(&mut self) -> Result<()> {
        if self.socket.is_none() {
            return Ok(());
        }

        // Blank frame with the shortest hold so WLED resumes its own effects
        let blank = self.encode_frame(&ColorSequence::default(), 1);
        if let Err(e) = self.send(&blank).await {
            warn!(error = %e, "Failed to blank light strip");
        }
        self.socket = None;
        debug!(address = %self.address, "Light controller stopped");
        Ok(())
    }

    async fn update(&mut self, colors: &ColorSequence) -> Result<()> {
        let packet = self.encode_frame(colors, self.hold_secs);
        self.send(&packet).await
    }
}
