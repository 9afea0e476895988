//! Decoded video frames.
//!
//! A `Frame` owns one RGB image plus its position in the source stream. Frames
//! are produced by `ingest`, resized to the zone coordinate space, annotated by
//! `render` and handed to a sink; nothing keeps them past one loop iteration.

use std::fmt;

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;

/// Width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for FrameSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// One RGB frame read from a source.
#[derive(Clone, Debug)]
pub struct Frame {
    /// Zero-based position in the stream.
    pub index: u64,
    image: RgbImage,
}

impl Frame {
    pub fn new(index: u64, image: RgbImage) -> Self {
        Self { index, image }
    }

    /// Build a frame from packed RGB24 bytes.
    pub fn from_rgb(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("RGB buffer does not fit {}x{}", width, height))?;
        Ok(Self { index, image })
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Packed RGB24 pixel bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Resize to `target` with bilinear filtering. No-op when already that size.
    pub fn resize_to(&mut self, target: FrameSize) -> Result<()> {
        if target.is_empty() {
            return Err(anyhow!("cannot resize frame to {}", target));
        }
        if self.size() == target {
            return Ok(());
        }
        self.image = imageops::resize(
            &self.image,
            target.width,
            target.height,
            FilterType::Triangle,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgb_checks_length() {
        assert!(Frame::from_rgb(0, 2, 2, vec![0u8; 12]).is_ok());
        assert!(Frame::from_rgb(0, 2, 2, vec![0u8; 11]).is_err());
    }

    #[test]
    fn resize_changes_dimensions_only_when_needed() {
        let mut frame = Frame::new(3, RgbImage::new(64, 48));
        frame.resize_to(FrameSize::new(32, 24)).unwrap();
        assert_eq!(frame.size(), FrameSize::new(32, 24));
        assert_eq!(frame.index, 3);

        frame.resize_to(FrameSize::new(32, 24)).unwrap();
        assert_eq!(frame.pixels().len(), 32 * 24 * 3);
    }

    #[test]
    fn resize_rejects_empty_target() {
        let mut frame = Frame::new(0, RgbImage::new(4, 4));
        assert!(frame.resize_to(FrameSize::new(0, 4)).is_err());
    }

    #[test]
    fn frame_size_display() {
        assert_eq!(FrameSize::new(1280, 720).to_string(), "1280x720");
        assert!(FrameSize::new(0, 720).is_empty());
    }
}
