use std::cmp::Ordering;

use crate::detect::result::Detection;

/// Class-wise greedy non-maximum suppression.
///
/// Candidates are visited by descending confidence; a box is dropped when it
/// overlaps an already kept box of the same class by more than
/// `iou_threshold`. At most `max_detections` boxes are returned.
pub fn non_max_suppression(
    mut candidates: Vec<Detection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Detection> {
    candidates.retain(Detection::is_finite);
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len().min(max_detections));
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == candidate.class_id && k.iou(&candidate) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Keep finite detections scoring strictly above `confidence`.
pub fn filter_confident(detections: &[Detection], confidence: f32) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.is_finite() && d.confidence > confidence)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlapping_boxes_of_same_class_collapse() {
        let boxes = vec![
            Detection::new(0.0, 0.0, 10.0, 10.0, 0.6, 2),
            Detection::new(1.0, 1.0, 10.0, 10.0, 0.9, 2),
            Detection::new(50.0, 50.0, 60.0, 60.0, 0.4, 2),
        ];
        let kept = non_max_suppression(boxes, 0.5, 100);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].confidence, 0.9);
        assert_eq!(kept[1].confidence, 0.4);
    }

    #[test]
    fn different_classes_are_not_suppressed() {
        let boxes = vec![
            Detection::new(0.0, 0.0, 10.0, 10.0, 0.9, 2),
            Detection::new(0.0, 0.0, 10.0, 10.0, 0.8, 7),
        ];
        assert_eq!(non_max_suppression(boxes, 0.5, 100).len(), 2);
    }

    #[test]
    fn max_detections_caps_output() {
        let boxes = (0..10)
            .map(|i| {
                let x = i as f32 * 20.0;
                Detection::new(x, 0.0, x + 10.0, 10.0, 0.5, 0)
            })
            .collect();
        assert_eq!(non_max_suppression(boxes, 0.5, 3).len(), 3);
    }

    #[test]
    fn confidence_filter_is_strict_and_drops_nan() {
        let boxes = [
            Detection::new(0.0, 0.0, 1.0, 1.0, 0.15, 0),
            Detection::new(0.0, 0.0, 1.0, 1.0, 0.16, 0),
            Detection::new(f32::NAN, 0.0, 1.0, 1.0, 0.9, 0),
        ];
        let kept = filter_confident(&boxes, 0.15);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.16);
    }
}
