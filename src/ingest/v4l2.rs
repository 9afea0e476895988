//! V4L2 camera source.
//!
//! A numeric source string `N` opens `/dev/videoN`. RGB24 capture is requested;
//! devices that refuse it may still deliver YUYV or NV12, which is converted.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::FrameSource;
use crate::frame::Frame;

const BUFFER_COUNT: u32 = 4;

/// Live camera frames from a V4L2 device.
pub struct V4l2Source {
    device_path: String,
    state: DeviceState,
    format: PixelFormat,
    width: u32,
    height: u32,
    frame_count: u64,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2Source {
    /// Open camera `index` and start streaming.
    pub fn open(index: u32) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device_path = format!("/dev/video{}", index);
        let mut device = v4l::Device::new(index as usize)
            .with_context(|| format!("open v4l2 device {}", device_path))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to request RGB3 on {}: {}",
                    device_path,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "{} delivers unsupported pixel format {}",
                device_path,
                format.fourcc
            )
        })?;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, BUFFER_COUNT)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        log::info!(
            "V4l2Source: connected to {} ({}x{}, {})",
            device_path,
            format.width,
            format.height,
            format.fourcc
        );

        Ok(Self {
            device_path,
            state,
            format: pixel_format,
            width: format.width,
            height: format.height,
            frame_count: 0,
        })
    }
}

impl FrameSource for V4l2Source {
    fn describe(&self) -> String {
        format!("{} ({}x{}, v4l2)", self.device_path, self.width, self.height)
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let (width, height, format) = (self.width, self.height, self.format);
        let pixels = self.state.with_mut(|fields| -> Result<Vec<u8>> {
            let (buf, _meta) = fields
                .stream
                .next()
                .map_err(|err| anyhow::Error::new(err).context("capture v4l2 frame"))?;
            normalize_to_rgb(buf, width, height, format)
        })?;

        let frame = Frame::from_rgb(self.frame_count, width, height, pixels)?;
        self.frame_count += 1;
        Ok(Some(frame))
    }
}
