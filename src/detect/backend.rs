use anyhow::Result;

use crate::detect::result::{ClassNames, Detection};
use crate::frame::Frame;

/// Object detector boundary.
///
/// A backend takes one frame and a confidence threshold and returns boxes in
/// the frame's pixel coordinates. Class indices refer to the table returned by
/// [`DetectorBackend::class_names`]. The model itself is opaque to the rest of
/// the crate.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class index to name table for this model.
    fn class_names(&self) -> &ClassNames;

    /// Run detection on a frame.
    ///
    /// Only detections scoring above `confidence` are returned. Boxes with
    /// non-finite coordinates are dropped.
    fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
