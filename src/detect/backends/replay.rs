use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess::filter_confident;
use crate::detect::result::{ClassNames, Detection};
use crate::frame::Frame;

/// Scripted detections loaded from JSON.
///
/// ```json
/// {
///   "class_names": ["person", "bicycle", "car"],
///   "frames": [
///     [{"x1": 10, "y1": 10, "x2": 60, "y2": 40, "confidence": 0.91, "class_id": 2}],
///     []
///   ]
/// }
/// ```
#[derive(Debug, Deserialize)]
struct ReplayScript {
    class_names: Option<Vec<String>>,
    frames: Vec<Vec<Detection>>,
}

/// Replays a fixed detection script, one entry per frame, wrapping around at
/// the end. Ignores pixel content. With an empty script every frame yields
/// no detections.
pub struct ReplayBackend {
    frames: Vec<Vec<Detection>>,
    class_names: ClassNames,
    cursor: usize,
}

impl ReplayBackend {
    pub fn new(frames: Vec<Vec<Detection>>, class_names: ClassNames) -> Self {
        Self {
            frames,
            class_names,
            cursor: 0,
        }
    }

    /// Backend that never detects anything.
    pub fn empty(class_names: ClassNames) -> Self {
        Self::new(Vec::new(), class_names)
    }

    /// Load a script file. Class names default to COCO when the script has none.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay script {}", path.display()))?;
        let script: ReplayScript = serde_json::from_str(&raw)
            .with_context(|| format!("invalid replay script {}", path.display()))?;
        let class_names = script
            .class_names
            .map(ClassNames::new)
            .unwrap_or_else(ClassNames::coco);
        log::info!(
            "ReplayBackend: {} scripted frame(s) from {}",
            script.frames.len(),
            path.display()
        );
        Ok(Self::new(script.frames, class_names))
    }

    /// Replace the class table, e.g. with one loaded from a names file.
    pub fn with_class_names(mut self, class_names: ClassNames) -> Self {
        self.class_names = class_names;
        self
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    fn detect(&mut self, _frame: &Frame, confidence: f32) -> Result<Vec<Detection>> {
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let scripted = &self.frames[self.cursor % self.frames.len()];
        self.cursor = self.cursor.wrapping_add(1);
        Ok(filter_confident(scripted, confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn frame() -> Frame {
        Frame::new(0, RgbImage::new(8, 8))
    }

    #[test]
    fn replays_frames_in_order_and_wraps() {
        let car = Detection::new(0.0, 0.0, 10.0, 10.0, 0.9, 2);
        let mut backend = ReplayBackend::new(vec![vec![car], vec![]], ClassNames::coco());

        assert_eq!(backend.detect(&frame(), 0.15).unwrap(), vec![car]);
        assert!(backend.detect(&frame(), 0.15).unwrap().is_empty());
        assert_eq!(backend.detect(&frame(), 0.15).unwrap(), vec![car]);
    }

    #[test]
    fn applies_confidence_threshold() {
        let weak = Detection::new(0.0, 0.0, 10.0, 10.0, 0.1, 2);
        let strong = Detection::new(0.0, 0.0, 10.0, 10.0, 0.8, 7);
        let mut backend = ReplayBackend::new(vec![vec![weak, strong]], ClassNames::coco());
        assert_eq!(backend.detect(&frame(), 0.15).unwrap(), vec![strong]);
    }

    #[test]
    fn empty_backend_detects_nothing() {
        let mut backend = ReplayBackend::empty(ClassNames::coco());
        assert!(backend.detect(&frame(), 0.0).unwrap().is_empty());
    }

    #[test]
    fn loads_script_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.json");
        std::fs::write(
            &path,
            r#"{
                "class_names": ["car", "van"],
                "frames": [[{"x1": 1, "y1": 2, "x2": 3, "y2": 4, "confidence": 0.5, "class_id": 1}]]
            }"#,
        )
        .unwrap();

        let mut backend = ReplayBackend::from_path(&path).unwrap();
        assert_eq!(backend.class_names().name(1), "van");
        let detections = backend.detect(&frame(), 0.15).unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_id, 1);
    }

    #[test]
    fn script_without_class_names_uses_coco() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.json");
        std::fs::write(&path, r#"{"frames": []}"#).unwrap();
        let backend = ReplayBackend::from_path(&path).unwrap();
        assert_eq!(backend.class_names().name(2), "car");
    }
}
