//! Parking Space Monitoring System (PSMS)
//!
//! Reports, frame by frame, which parking spaces in a camera view are taken.
//!
//! # Architecture
//!
//! A run is a single-threaded pipeline:
//!
//! 1. **Zones** are loaded once from a plain-text file (`zones`): polygons in
//!    a fixed frame coordinate space plus the declared zone count.
//! 2. **Frames** come from a source (`ingest`) and are resized to that space.
//! 3. **Detections** come from a pluggable backend (`detect`).
//! 4. **Occupancy**: each detection's box centroid is tested against the zones
//!    in declaration order and the first containing zone claims it
//!    (`occupancy`, `geometry`).
//! 5. **Output**: the overlay is drawn (`render`) and the frame is handed to a
//!    sink (`sink`). `pipeline` ties the steps together.
//!
//! # Module Structure
//!
//! - `zones`, `geometry`, `occupancy`: the zone model and the classifier
//! - `frame`, `ingest`, `detect`, `render`, `sink`, `pipeline`: the frame loop
//! - `config`, `error`: run configuration and typed failures

pub mod config;
pub mod detect;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod occupancy;
pub mod pipeline;
pub mod render;
pub mod sink;
pub mod zones;

pub use config::{DetectorSettings, MonitorConfig, OutputSettings};
pub use detect::{open_backend, BackendKind, ClassNames, Detection, DetectorBackend};
pub use error::PsmsError;
pub use frame::{Frame, FrameSize};
pub use geometry::{Containment, PixelPoint};
pub use ingest::{open_source, FrameSource};
pub use occupancy::{
    classify, classify_into, count_occupied, AnnotatedObject, Classification, OccupancySummary,
    ZoneOccupancy,
};
pub use pipeline::{FrameLoop, LoopSettings, RunSummary, StopReason};
pub use render::{OverlayOptions, Renderer};
pub use sink::{FrameSink, HeadlessSink, ImageDirSink, LoopControl, QuitSignal};
pub use zones::{UnmatchedLinePolicy, Zone, ZoneConfig, ZoneSet};
