use std::borrow::Cow;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::{self, PixelPoint};

/// One object reported by a detector, in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, class_id: usize) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            confidence,
            class_id,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2, self.confidence]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Integer box midpoint used for zone containment.
    pub fn centroid(&self) -> Option<PixelPoint> {
        geometry::box_centroid(self.x1, self.y1, self.x2, self.y2)
    }

    pub fn area(&self) -> f32 {
        (self.x2 - self.x1).max(0.0) * (self.y2 - self.y1).max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &Detection) -> f32 {
        let iw = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let ih = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = iw * ih;
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter + 1e-6)
    }
}

/// Class index to class name table published by a detector.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The 80 COCO classes in the order YOLO models emit them.
    pub fn coco() -> Self {
        Self::new(COCO_CLASSES.iter().copied())
    }

    /// Read one class name per line; blank lines are skipped.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read class names from {}", path.display()))?;
        Ok(Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        ))
    }

    /// Name for `class_id`, or `class_<id>` when the table has no entry.
    pub fn name(&self, class_id: usize) -> Cow<'_, str> {
        match self.names.get(class_id) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("class_{}", class_id)),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket", "bottle",
    "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich",
    "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse", "remote",
    "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator", "book",
    "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];
