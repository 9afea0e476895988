//! Synthetic frame source (`stub://`) for tests and dry runs.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use super::FrameSource;
use crate::frame::{Frame, FrameSize};

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

/// Generates a moving gradient. Endless unless `frames=N` is given.
///
/// `stub://lot?frames=10&size=1280x720`
pub struct SyntheticSource {
    name: String,
    size: FrameSize,
    limit: Option<u64>,
    frame_count: u64,
    scene_state: u8,
}

impl SyntheticSource {
    pub fn new(name: impl Into<String>, size: FrameSize, limit: Option<u64>) -> Self {
        Self {
            name: name.into(),
            size,
            limit,
            frame_count: 0,
            scene_state: 0,
        }
    }

    pub fn from_spec(spec: &str) -> Result<Self> {
        let rest = spec
            .trim()
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic sources start with stub://"))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));

        let mut size = FrameSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT);
        let mut limit = None;
        for pair in query.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            match key {
                "frames" => {
                    limit = Some(
                        value
                            .parse()
                            .with_context(|| format!("invalid frame count '{}'", value))?,
                    )
                }
                "size" => size = parse_size(value)?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }

        Ok(Self::new(name, size, limit))
    }

    pub fn size(&self) -> FrameSize {
        self.size
    }

    fn generate(&mut self) -> RgbImage {
        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }
        let shift = self.frame_count + u64::from(self.scene_state);
        RgbImage::from_fn(self.size.width, self.size.height, |x, y| {
            let base = u64::from(x) + u64::from(y) + shift;
            image::Rgb([
                (base % 256) as u8,
                ((base / 2) % 256) as u8,
                ((base / 3) % 256) as u8,
            ])
        })
    }
}

impl FrameSource for SyntheticSource {
    fn describe(&self) -> String {
        format!("stub://{} (synthetic {})", self.name, self.size)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.limit.is_some_and(|limit| self.frame_count >= limit) {
            return Ok(None);
        }
        let image = self.generate();
        let frame = Frame::new(self.frame_count, image);
        self.frame_count += 1;
        Ok(Some(frame))
    }
}

fn parse_size(value: &str) -> Result<FrameSize> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| anyhow!("size must look like WIDTHxHEIGHT, got '{}'", value))?;
    let size = FrameSize::new(
        w.parse().with_context(|| format!("invalid width '{}'", w))?,
        h.parse().with_context(|| format!("invalid height '{}'", h))?,
    );
    if size.is_empty() {
        return Err(anyhow!("stub frame size must be non-zero"));
    }
    Ok(size)
}
