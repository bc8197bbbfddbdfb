//! RPM to LED colour mapping
//!
//! Maps engine speed onto a green → yellow → red ramp relative to the current
//! car's idle and redline. Every pixel shows the same ramp colour, so the whole
//! strip shifts colour as the engine approaches the limiter.

use tracing::debug;

use crate::types::{ColorSequence, Rgb};

/// Calibrated RPM to colour transformation.
pub trait RpmMapper: Send + 'static {
    fn idle_rpm(&self) -> f64;

    fn redline(&self) -> f64;

    fn set_idle_rpm(&mut self, idle_rpm: f64);

    fn set_redline(&mut self, redline: f64);

    /// Record the current engine speed.
    fn set_rpm(&mut self, rpm: f64);

    /// Colours for the current engine speed. Pure, callable every tick.
    fn to_color_sequence(&self) -> ColorSequence;
}

/// Colour stops of the RPM ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RampColors {
    pub idle: Rgb,
    pub mid: Rgb,
    pub redline: Rgb,
}

impl Default for RampColors {
    fn default() -> Self {
        Self { idle: Rgb::GREEN, mid: Rgb::YELLOW, redline: Rgb::RED }
    }
}

/// LED strip that visualises engine RPM.
#[derive(Debug, Clone)]
pub struct RpmStrip {
    pixel_count: usize,
    idle_rpm: f64,
    redline: f64,
    rpm: f64,
    colors: RampColors,
}

impl RpmStrip {
    pub fn new(pixel_count: usize, idle_rpm: f64, redline: f64) -> Self {
        Self { pixel_count, idle_rpm, redline, rpm: idle_rpm, colors: RampColors::default() }
    }

    pub fn with_colors(mut self, colors: RampColors) -> Self {
        self.colors = colors;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Position of the current RPM inside `[idle, redline]`, from 0.0 to 1.0.
    ///
    /// A degenerate calibration (redline at or below idle) reads as fully lit once
    /// the engine reaches the redline and dark below it.
    pub fn ramp_position(&self) -> f64 {
        let span = self.redline - self.idle_rpm;
        if !span.is_finite() || span <= 0.0 {
            return if self.rpm >= self.redline { 1.0 } else { 0.0 };
        }
        let position = (self.rpm - self.idle_rpm) / span;
        if position.is_nan() { 0.0 } else { position.clamp(0.0, 1.0) }
    }

    /// Ramp colour for the current RPM.
    pub fn current_color(&self) -> Rgb {
        let position = self.ramp_position();
        if position <= 0.5 {
            self.colors.idle.lerp(self.colors.mid, position * 2.0)
        } else {
            self.colors.mid.lerp(self.colors.redline, (position - 0.5) * 2.0)
        }
    }
}

impl RpmMapper for RpmStrip {
    fn idle_rpm(&self) -> f64 {
        self.idle_rpm
    }

    fn redline(&self) -> f64 {
        self.redline
    }

    fn set_idle_rpm(&mut self, idle_rpm: f64) {
        debug!(old = self.idle_rpm, new = idle_rpm, "Idle RPM recalibrated");
        self.idle_rpm = idle_rpm;
    }

    fn set_redline(&mut self, redline: f64) {
        debug!(old = self.redline, new = redline, "Redline recalibrated");
        self.redline = redline;
    }

    fn set_rpm(&mut self, rpm: f64) {
        self.rpm = rpm;
    }

    fn to_color_sequence(&self) -> ColorSequence {
        ColorSequence::uniform(self.current_color(), self.pixel_count)
    }
}
