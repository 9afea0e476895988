//! Frame ingestion sources.
//!
//! `open_source` understands four kinds of source string:
//! - `stub://<name>[?frames=N&size=WxH]` synthetic frames (testing)
//! - a string of digits: camera index, `/dev/video<N>` (feature: ingest-v4l2)
//! - a directory of still images, or a single image file
//! - any other local file: decoded video (feature: ingest-file-ffmpeg)
//!
//! Every source yields RGB frames in stream order and returns `Ok(None)` at
//! end-of-stream. A source that cannot be opened fails with
//! [`PsmsError::CameraUnavailable`].

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

use std::path::Path;

use anyhow::Result;

use crate::error::PsmsError;
use crate::frame::Frame;

pub use file::FileSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

/// A stream of frames.
pub trait FrameSource {
    /// Human-readable origin, used in logs.
    fn describe(&self) -> String;

    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        (**self).next_frame()
    }
}

/// What a source string refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    Synthetic,
    Camera(u32),
    File,
}

impl SourceKind {
    pub fn classify(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.starts_with("stub://") {
            SourceKind::Synthetic
        } else if !spec.is_empty() && spec.bytes().all(|b| b.is_ascii_digit()) {
            match spec.parse() {
                Ok(index) => SourceKind::Camera(index),
                Err(_) => SourceKind::File,
            }
        } else {
            SourceKind::File
        }
    }
}

/// Open the source named by `spec`.
pub fn open_source(spec: &str) -> Result<Box<dyn FrameSource>> {
    let opened = match SourceKind::classify(spec) {
        SourceKind::Synthetic => {
            SyntheticSource::from_spec(spec).map(|s| Box::new(s) as Box<dyn FrameSource>)
        }
        SourceKind::Camera(index) => open_camera(index),
        SourceKind::File => {
            FileSource::open(Path::new(spec.trim())).map(|s| Box::new(s) as Box<dyn FrameSource>)
        }
    };

    let source = opened.map_err(|err| PsmsError::CameraUnavailable {
        source_spec: spec.to_string(),
        reason: format!("{:#}", err),
    })?;
    log::info!("video source opened: {}", source.describe());
    Ok(source)
}

#[cfg(feature = "ingest-v4l2")]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::open(index)?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_camera(index: u32) -> Result<Box<dyn FrameSource>> {
    Err(anyhow::anyhow!(
        "camera {} requires the ingest-v4l2 feature",
        index
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_source_strings() {
        assert_eq!(SourceKind::classify("stub://lot"), SourceKind::Synthetic);
        assert_eq!(SourceKind::classify("0"), SourceKind::Camera(0));
        assert_eq!(SourceKind::classify(" 2 "), SourceKind::Camera(2));
        assert_eq!(SourceKind::classify("parking.mp4"), SourceKind::File);
        assert_eq!(SourceKind::classify("frames/"), SourceKind::File);
        assert_eq!(SourceKind::classify(""), SourceKind::File);
    }

    #[test]
    fn missing_file_is_camera_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mp4");
        let err = open_source(missing.to_str().unwrap()).err().unwrap();
        match err.downcast_ref::<PsmsError>() {
            Some(PsmsError::CameraUnavailable { source_spec, .. }) => {
                assert!(source_spec.ends_with("nope.mp4"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn stub_source_opens() {
        let mut source = open_source("stub://lot?frames=1").unwrap();
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }
}
