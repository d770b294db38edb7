//! Raster frames.
//!
//! A `Frame` is one decoded RGB image from a frame source. Detectors receive
//! `&Frame` and must treat the pixels as read-only; annotation works on a copy.

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

/// One decoded frame, packed RGB24.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    /// Build a frame from packed RGB bytes. The buffer length must be exactly
    /// `width * height * 3`.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("invalid {}x{} RGB buffer", width, height))?;
        Ok(Self { image })
    }

    /// Solid-colour frame.
    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, Rgb(color)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Paint an axis-aligned rectangle, clipped to the frame. Used to build
    /// synthetic scenes.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: [u8; 3]) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y..y_end {
            for px in x..x_end {
                self.image.put_pixel(px, py, Rgb(color));
            }
        }
    }
}

impl From<RgbImage> for Frame {
    fn from(image: RgbImage) -> Self {
        Self::new(image)
    }
}
