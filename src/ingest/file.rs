//! Local file frame sources.
//!
//! A directory is read as a sequence of still images in file-name order; a
//! single still image is a one-frame stream. Anything else is handed to the
//! FFmpeg decoder when the `ingest-file-ffmpeg` feature is enabled.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};

use super::FrameSource;
#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::Frame;

const STILL_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Stills(StillImageSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        if path.as_os_str().is_empty() {
            return Err(anyhow!("empty source path"));
        }
        if path.to_string_lossy().contains("://") {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes)"
            ));
        }
        if path.is_dir() {
            return Ok(Self {
                backend: FileBackend::Stills(StillImageSource::from_dir(path)?),
            });
        }
        if !path.exists() {
            return Err(anyhow!("{} does not exist", path.display()));
        }
        if is_still_image(path) {
            return Ok(Self {
                backend: FileBackend::Stills(StillImageSource::new(
                    path.display().to_string(),
                    vec![path.to_path_buf()],
                )),
            });
        }

        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(path)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding {} requires the ingest-file-ffmpeg feature",
                path.display()
            ))
        }
    }
}

impl FrameSource for FileSource {
    fn describe(&self) -> String {
        match &self.backend {
            FileBackend::Stills(source) => source.describe(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.describe(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Stills(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

// ----------------------------------------------------------------------------
// Still images
// ----------------------------------------------------------------------------

/// Decodes one still image per frame, in the given order.
pub struct StillImageSource {
    label: String,
    paths: Vec<PathBuf>,
    cursor: usize,
}

impl StillImageSource {
    pub fn new(label: String, paths: Vec<PathBuf>) -> Self {
        Self {
            label,
            paths,
            cursor: 0,
        }
    }

    /// All still images directly inside `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list {}", dir.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("failed to list {}", dir.display()))?
                .path();
            if path.is_file() && is_still_image(&path) {
                paths.push(path);
            }
        }
        if paths.is_empty() {
            return Err(anyhow!("{} contains no still images", dir.display()));
        }
        paths.sort();
        Ok(Self::new(dir.display().to_string(), paths))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    fn describe(&self) -> String {
        format!("{} ({} still image(s))", self.label, self.paths.len())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.cursor) else {
            return Ok(None);
        };
        let image = image::open(path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .into_rgb8();
        let frame = Frame::new(self.cursor as u64, image);
        self.cursor += 1;
        Ok(Some(frame))
    }
}

fn is_still_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            STILL_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
