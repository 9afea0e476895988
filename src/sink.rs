//! Where annotated frames go, and how a run is asked to stop.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};

use crate::frame::Frame;
use crate::occupancy::OccupancySummary;

/// Returned by a sink after each frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Stop,
}

/// Consumer of annotated frames.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame, summary: &OccupancySummary) -> Result<LoopControl>;
}

impl<S: FrameSink + ?Sized> FrameSink for &mut S {
    fn present(&mut self, frame: &Frame, summary: &OccupancySummary) -> Result<LoopControl> {
        (**self).present(frame, summary)
    }
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn present(&mut self, frame: &Frame, summary: &OccupancySummary) -> Result<LoopControl> {
        (**self).present(frame, summary)
    }
}

/// Discards frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeadlessSink;

impl FrameSink for HeadlessSink {
    fn present(&mut self, _frame: &Frame, _summary: &OccupancySummary) -> Result<LoopControl> {
        Ok(LoopControl::Continue)
    }
}

/// Writes every n-th annotated frame to `dir/frame_<index>.png`.
pub struct ImageDirSink {
    dir: PathBuf,
    every_n: u64,
    written: u64,
}

impl ImageDirSink {
    /// Create the directory if needed. `every_n` must be non-zero.
    pub fn new(dir: impl Into<PathBuf>, every_n: u32) -> Result<Self> {
        if every_n == 0 {
            return Err(anyhow!("every_n must be greater than zero"));
        }
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir,
            every_n: u64::from(every_n),
            written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn path_for(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }
}

impl FrameSink for ImageDirSink {
    fn present(&mut self, frame: &Frame, _summary: &OccupancySummary) -> Result<LoopControl> {
        if frame.index % self.every_n != 0 {
            return Ok(LoopControl::Continue);
        }
        let path = self.path_for(frame.index);
        frame
            .image()
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.written += 1;
        log::debug!("wrote {}", path.display());
        Ok(LoopControl::Continue)
    }
}

/// Shared quit flag checked by the frame loop before each frame.
#[derive(Clone, Debug, Default)]
pub struct QuitSignal {
    flag: Arc<AtomicBool>,
}

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal raised by Ctrl-C. Only one handler can be installed per process.
    pub fn install_ctrlc() -> Result<Self> {
        let signal = Self::new();
        let handler = signal.clone();
        ctrlc::set_handler(move || {
            log::info!("quit requested");
            handler.request();
        })
        .context("error setting Ctrl-C handler")?;
        Ok(signal)
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
