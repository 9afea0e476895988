#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess::non_max_suppression;
use crate::detect::result::{ClassNames, Detection};
use crate::frame::Frame;

const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_MAX_DETECTIONS: usize = 300;

/// Tract-based backend for YOLO ONNX exports (v8/v11 output layout).
///
/// The model is expected to take a `1x3xSxS` float input in `[0, 1]` and to
/// emit `[1, 4 + classes, anchors]` with `cx, cy, w, h` in input pixels
/// followed by per-class scores. Frames are stretched to the input size and
/// boxes are scaled back to frame pixels.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    iou_threshold: f32,
    max_detections: usize,
    class_names: ClassNames,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_size: u32,
        class_names: ClassNames,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        if input_size == 0 {
            return Err(anyhow!("model input size must be > 0"));
        }
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input, {} classes)",
            model_path.display(),
            input_size,
            input_size,
            class_names.len()
        );

        Ok(Self {
            model,
            input_size,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_detections: DEFAULT_MAX_DETECTIONS,
            class_names,
        })
    }

    /// Override the NMS overlap threshold.
    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let side = self.input_size;
        let resized = imageops::resize(frame.image(), side, side, FilterType::Triangle);
        let side = side as usize;
        let pixels = resized.as_raw();
        tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            let idx = (y * side + x) * 3 + channel;
            pixels[idx] as f32 / 255.0
        })
        .into_tensor()
    }

    fn decode(&self, output: &Tensor, frame: &Frame, confidence: f32) -> Result<Vec<Detection>> {
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, 4 + classes, anchors]")?;
        let size = frame.size();
        let scale = (
            size.width as f32 / self.input_size as f32,
            size.height as f32 / self.input_size as f32,
        );
        decode_yolo(
            view,
            scale,
            confidence,
            self.iou_threshold,
            self.max_detections,
        )
    }
}

/// Turn a `[1, 4 + classes, anchors]` YOLO head into frame-space detections.
///
/// Each anchor takes its best-scoring class; anchors scoring at or below
/// `confidence` are dropped. `cx, cy, w, h` are converted to corners and
/// multiplied by `scale` (frame pixels per input pixel) before NMS.
fn decode_yolo(
    view: tract_ndarray::ArrayView3<f32>,
    scale: (f32, f32),
    confidence: f32,
    iou_threshold: f32,
    max_detections: usize,
) -> Result<Vec<Detection>> {
    let (_, rows, anchors) = view.dim();
    if rows <= 4 {
        return Err(anyhow!("model output has {} rows, expected > 4", rows));
    }
    let (sx, sy) = scale;

    let mut candidates = Vec::new();
    for a in 0..anchors {
        let (class_id, score) = (4..rows)
            .map(|row| (row - 4, view[[0, row, a]]))
            .fold((0, f32::NEG_INFINITY), |best, cur| {
                if cur.1 > best.1 {
                    cur
                } else {
                    best
                }
            });
        if score.is_nan() || score <= confidence {
            continue;
        }
        let (cx, cy) = (view[[0, 0, a]], view[[0, 1, a]]);
        let (w, h) = (view[[0, 2, a]], view[[0, 3, a]]);
        candidates.push(Detection::new(
            (cx - w / 2.0) * sx,
            (cy - h / 2.0) * sy,
            (cx + w / 2.0) * sx,
            (cy + h / 2.0) * sy,
            score,
            class_id,
        ));
    }

    Ok(non_max_suppression(candidates, iou_threshold, max_detections))
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_names(&self) -> &ClassNames {
        &self.class_names
    }

    fn detect(&mut self, frame: &Frame, confidence: f32) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        self.decode(output, frame, confidence)
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size as usize;
        let blank = tract_ndarray::Array4::<f32>::zeros((1, 3, side, side)).into_tensor();
        self.model
            .run(tvec!(blank.into()))
            .context("ONNX warm-up failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tract_ndarray::Array3;

    /// Build a `[1, 4 + classes, anchors]` head from per-anchor rows of
    /// `cx, cy, w, h, score...`.
    fn head(anchors: &[&[f32]]) -> Array3<f32> {
        let rows = anchors[0].len();
        Array3::from_shape_fn((1, rows, anchors.len()), |(_, row, a)| anchors[a][row])
    }

    #[test]
    fn picks_best_class_and_scales_to_frame() {
        // 640x640 input, 1280x720 frame
        let out = head(&[&[320.0, 320.0, 64.0, 128.0, 0.1, 0.2, 0.8]]);
        let dets = decode_yolo(out.view(), (2.0, 1.125), 0.15, 0.7, 300).unwrap();

        assert_eq!(dets.len(), 1);
        let det = dets[0];
        assert_eq!(det.class_id, 2);
        assert_eq!(det.confidence, 0.8);
        assert_eq!((det.x1, det.x2), (576.0, 704.0));
        assert_eq!((det.y1, det.y2), (288.0, 432.0));
    }

    #[test]
    fn score_equal_to_threshold_is_dropped() {
        let out = head(&[
            &[10.0, 10.0, 4.0, 4.0, 0.5, 0.0],
            &[100.0, 100.0, 4.0, 4.0, 0.0, 0.5000001],
            &[200.0, 200.0, 4.0, 4.0, f32::NAN, f32::NAN],
        ]);
        let dets = decode_yolo(out.view(), (1.0, 1.0), 0.5, 0.7, 300).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_id, 1);
        assert_eq!((dets[0].x1, dets[0].y1), (98.0, 98.0));
    }

    #[test]
    fn overlapping_anchors_are_suppressed() {
        let out = head(&[
            &[50.0, 50.0, 20.0, 20.0, 0.0, 0.9],
            &[51.0, 50.0, 20.0, 20.0, 0.0, 0.6],
            &[51.0, 50.0, 20.0, 20.0, 0.7, 0.0],
        ]);
        let dets = decode_yolo(out.view(), (1.0, 1.0), 0.15, 0.7, 300).unwrap();

        let mut kept: Vec<(usize, f32)> = dets.iter().map(|d| (d.class_id, d.confidence)).collect();
        kept.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(kept, vec![(0, 0.7), (1, 0.9)]);
    }

    #[test]
    fn head_without_class_rows_is_rejected() {
        let out = Array3::<f32>::zeros((1, 4, 8));
        let err = decode_yolo(out.view(), (1.0, 1.0), 0.15, 0.7, 300).unwrap_err();
        assert!(err.to_string().contains("expected > 4"));
    }
}
