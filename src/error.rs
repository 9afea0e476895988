use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions surfaced by the monitor.
///
/// Library functions return `anyhow::Result`; these variants are the typed
/// root causes callers can recover with `downcast_ref::<PsmsError>()`.
#[derive(Error, Debug)]
pub enum PsmsError {
    #[error("zone configuration not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    #[error("zone configuration does not declare a non-zero frame_width/frame_height pair")]
    MissingFrameDimensions,

    #[error("zone configuration line {line} is malformed: {text:?}")]
    MalformedZoneLine { line: usize, text: String },

    #[error("cannot open video source '{source_spec}': {reason}")]
    CameraUnavailable { source_spec: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
