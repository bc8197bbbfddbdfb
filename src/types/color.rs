//! Pixel colour types

use serde::{Deserialize, Serialize};

/// One RGB pixel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Linear blend towards `other`, `t` in `[0, 1]`.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

/// Ordered pixel colours, index 0 is the first LED on the strip.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ColorSequence(Vec<Rgb>);

impl ColorSequence {
    /// Every pixel set to the same colour.
    pub fn uniform(color: Rgb, pixel_count: usize) -> Self {
        Self(vec![color; pixel_count])
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flatten into `r, g, b, r, g, b, ...` bytes.
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|px| [px.r, px.g, px.b]).collect()
    }
}

impl From<Vec<Rgb>> for ColorSequence {
    fn from(pixels: Vec<Rgb>) -> Self {
        Self(pixels)
    }
}
