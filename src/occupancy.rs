//! Zone occupancy classification.
//!
//! Each detection is reduced to its integer box centroid and tested against
//! the zones in declaration order. The first zone containing the centroid
//! (boundary included) claims the detection; overlapping zones are resolved
//! by that order alone. Nothing is carried from one frame to the next.

use crate::detect::{ClassNames, Detection};
use crate::geometry::{self, PixelPoint};
use crate::zones::ZoneSet;

/// Per-zone occupant class names for one frame, indexed by zone position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ZoneOccupancy {
    lists: Vec<Vec<String>>,
}

impl ZoneOccupancy {
    /// `zone_count` empty lists.
    pub fn new(zone_count: usize) -> Self {
        Self {
            lists: vec![Vec::new(); zone_count],
        }
    }

    /// Number of lists; always the declared zone count.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Occupants of the zone at `index`.
    pub fn occupants(&self, index: usize) -> &[String] {
        self.lists.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_occupied(&self, index: usize) -> bool {
        !self.occupants(index).is_empty()
    }

    pub fn lists(&self) -> &[Vec<String>] {
        &self.lists
    }

    fn push(&mut self, index: usize, class_name: String) -> bool {
        match self.lists.get_mut(index) {
            Some(list) => {
                list.push(class_name);
                true
            }
            None => false,
        }
    }
}

/// A detection selected for drawing.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotatedObject {
    pub detection: Detection,
    pub centroid: PixelPoint,
    pub class_name: String,
    /// Position of the zone that claimed this object, when attributed.
    pub zone: Option<usize>,
}

/// Output of [`classify`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    pub annotated: Vec<AnnotatedObject>,
    pub occupancy: ZoneOccupancy,
}

/// Occupied/vacant totals for one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OccupancySummary {
    pub total: usize,
    pub occupied: usize,
    pub vacant: usize,
}

impl OccupancySummary {
    pub fn from_occupancy(zone_count: usize, occupancy: &ZoneOccupancy) -> Self {
        let occupied = count_occupied(zone_count, occupancy);
        Self {
            total: zone_count,
            occupied,
            vacant: zone_count - occupied,
        }
    }
}

/// Attribute detections to zones on freshly allocated occupancy lists.
pub fn classify(
    detections: &[Detection],
    zones: &ZoneSet,
    zone_count: usize,
    class_names: &ClassNames,
) -> Classification {
    let mut occupancy = ZoneOccupancy::new(zone_count);
    let annotated = classify_into(&mut occupancy, detections, zones, class_names);
    Classification {
        annotated,
        occupancy,
    }
}

/// Attribute detections to zones, appending to the caller's lists.
///
/// With an empty zone set every detection is annotated and nothing is
/// attributed. Otherwise a detection is annotated only when some zone
/// contains its centroid. A match on a zone whose position is past the end of
/// `occupancy` is annotated but not counted.
pub fn classify_into(
    occupancy: &mut ZoneOccupancy,
    detections: &[Detection],
    zones: &ZoneSet,
    class_names: &ClassNames,
) -> Vec<AnnotatedObject> {
    let mut annotated = Vec::new();

    for detection in detections {
        let Some(centroid) = detection.centroid() else {
            log::debug!("skipping detection with unusable box: {:?}", detection);
            continue;
        };
        let class_name = class_names.name(detection.class_id).into_owned();

        if zones.is_empty() {
            annotated.push(AnnotatedObject {
                detection: *detection,
                centroid,
                class_name,
                zone: None,
            });
            continue;
        }

        let claimed = zones
            .iter()
            .position(|zone| geometry::contains(zone.pixel_polygon(), centroid));
        let Some(index) = claimed else {
            continue;
        };

        let zone = if occupancy.push(index, class_name.clone()) {
            Some(index)
        } else {
            log::trace!(
                "zone at position {} is beyond the declared count {}",
                index,
                occupancy.len()
            );
            None
        };
        annotated.push(AnnotatedObject {
            detection: *detection,
            centroid,
            class_name,
            zone,
        });
    }

    annotated
}

/// Number of zone positions in `0..zone_count` with at least one occupant.
pub fn count_occupied(zone_count: usize, occupancy: &ZoneOccupancy) -> usize {
    (0..zone_count)
        .filter(|&index| occupancy.is_occupied(index))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameSize;
    use crate::zones::Zone;

    fn names() -> ClassNames {
        ClassNames::new(["person", "bicycle", "car", "motorcycle"])
    }

    fn square(id: u32, x0: f64, y0: f64, side: f64) -> Zone {
        Zone::new(
            id,
            vec![(x0, y0), (x0 + side, y0), (x0 + side, y0 + side), (x0, y0 + side)],
        )
        .unwrap()
    }

    fn zone_set(zones: Vec<Zone>) -> ZoneSet {
        ZoneSet::from_zones(FrameSize::new(640, 480), zones)
    }

    /// Box whose integer centroid is exactly (cx, cy).
    fn car_at(cx: f32, cy: f32) -> Detection {
        Detection::new(cx - 2.0, cy - 2.0, cx + 2.0, cy + 2.0, 0.9, 2)
    }

    #[test]
    fn centroid_inside_zone_occupies_it() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0)]);
        let result = classify(&[car_at(5.0, 5.0)], &zones, 1, &names());

        assert_eq!(result.occupancy.lists(), &[vec!["car".to_string()]]);
        assert_eq!(count_occupied(1, &result.occupancy), 1);
        let summary = OccupancySummary::from_occupancy(1, &result.occupancy);
        assert_eq!(summary.vacant, 0);
        assert_eq!(result.annotated.len(), 1);
        assert_eq!(result.annotated[0].zone, Some(0));
        assert_eq!(result.annotated[0].centroid, PixelPoint::new(5, 5));
    }

    #[test]
    fn centroid_outside_all_zones_is_dropped() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0)]);
        let result = classify(&[car_at(50.0, 50.0)], &zones, 1, &names());

        assert_eq!(result.occupancy.lists(), &[Vec::<String>::new()]);
        assert_eq!(count_occupied(1, &result.occupancy), 0);
        assert!(result.annotated.is_empty());
    }

    #[test]
    fn boundary_centroid_counts_as_inside() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0)]);
        for (x, y) in [(10.0, 5.0), (0.0, 0.0), (5.0, 10.0)] {
            let result = classify(&[car_at(x, y)], &zones, 1, &names());
            assert!(result.occupancy.is_occupied(0), "({x}, {y})");
        }
    }

    #[test]
    fn empty_zone_set_annotates_everything_and_counts_nothing() {
        let zones = zone_set(vec![]);
        let detections = [car_at(5.0, 5.0), car_at(500.0, 400.0)];
        let result = classify(&detections, &zones, 2, &names());

        assert_eq!(result.annotated.len(), 2);
        assert!(result.annotated.iter().all(|obj| obj.zone.is_none()));
        assert_eq!(result.occupancy.len(), 2);
        assert_eq!(count_occupied(2, &result.occupancy), 0);
    }

    #[test]
    fn occupancy_length_follows_declared_count() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0)]);
        let result = classify(&[car_at(5.0, 5.0)], &zones, 3, &names());

        assert_eq!(result.occupancy.len(), 3);
        assert!(result.occupancy.occupants(1).is_empty());
        assert!(result.occupancy.occupants(2).is_empty());
        let summary = OccupancySummary::from_occupancy(3, &result.occupancy);
        assert_eq!((summary.occupied, summary.vacant), (1, 2));
    }

    #[test]
    fn occupancy_is_indexed_by_position_not_identifier() {
        let zones = zone_set(vec![square(7, 0.0, 0.0, 10.0), square(2, 100.0, 0.0, 10.0)]);
        let result = classify(&[car_at(105.0, 5.0)], &zones, 2, &names());

        assert!(!result.occupancy.is_occupied(0));
        assert_eq!(result.occupancy.occupants(1), &["car".to_string()]);
    }

    #[test]
    fn overlapping_zones_first_declared_wins() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 20.0), square(1, 10.0, 10.0, 20.0)]);
        let result = classify(&[car_at(15.0, 15.0)], &zones, 2, &names());

        assert_eq!(result.occupancy.occupants(0).len(), 1);
        assert!(result.occupancy.occupants(1).is_empty());
    }

    #[test]
    fn several_objects_can_share_a_zone() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 100.0)]);
        let person = Detection::new(10.0, 10.0, 20.0, 30.0, 0.7, 0);
        let result = classify(&[car_at(50.0, 50.0), person], &zones, 1, &names());

        assert_eq!(
            result.occupancy.occupants(0),
            &["car".to_string(), "person".to_string()]
        );
        assert_eq!(count_occupied(1, &result.occupancy), 1);
    }

    #[test]
    fn match_beyond_declared_count_is_drawn_not_counted() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0), square(1, 100.0, 0.0, 10.0)]);
        let result = classify(&[car_at(105.0, 5.0)], &zones, 1, &names());

        assert_eq!(result.occupancy.len(), 1);
        assert_eq!(count_occupied(1, &result.occupancy), 0);
        assert_eq!(result.annotated.len(), 1);
        assert_eq!(result.annotated[0].zone, None);
    }

    #[test]
    fn non_finite_detection_is_skipped() {
        let zones = zone_set(vec![]);
        let bad = Detection::new(f32::NAN, 0.0, 10.0, 10.0, 0.9, 2);
        let result = classify(&[bad], &zones, 0, &names());
        assert!(result.annotated.is_empty());
    }

    #[test]
    fn detection_beyond_pixel_range_is_skipped() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0)]);
        let far = Detection::new(3e38, 3e38, 3e38, 3e38, 0.9, 2);
        let result = classify(&[far, car_at(5.0, 5.0)], &zones, 1, &names());

        assert_eq!(result.annotated.len(), 1);
        assert_eq!(result.annotated[0].centroid, PixelPoint::new(5, 5));
        assert_eq!(result.occupancy.occupants(0), &["car".to_string()]);

        let unzoned = classify(&[far], &zone_set(vec![]), 0, &names());
        assert!(unzoned.annotated.is_empty());
    }

    #[test]
    fn unknown_class_uses_placeholder_name() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0)]);
        let mut det = car_at(5.0, 5.0);
        det.class_id = 42;
        let result = classify(&[det], &zones, 1, &names());
        assert_eq!(result.occupancy.occupants(0), &["class_42".to_string()]);
    }

    #[test]
    fn classify_is_idempotent_on_fresh_lists() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0), square(1, 20.0, 0.0, 10.0)]);
        let detections = [car_at(5.0, 5.0), car_at(25.0, 5.0), car_at(80.0, 80.0)];

        let first = classify(&detections, &zones, 2, &names());
        let second = classify(&detections, &zones, 2, &names());
        assert_eq!(first, second);

        let mut fresh = ZoneOccupancy::new(2);
        classify_into(&mut fresh, &detections, &zones, &names());
        assert_eq!(fresh, first.occupancy);
    }

    #[test]
    fn occupied_count_stays_within_zone_count() {
        let zones = zone_set(vec![square(0, 0.0, 0.0, 10.0), square(1, 20.0, 0.0, 10.0)]);
        let detections: Vec<Detection> = (0..40)
            .map(|i| car_at((i % 8) as f32 * 5.0, (i / 8) as f32 * 3.0))
            .collect();
        for zone_count in 0..4 {
            let result = classify(&detections, &zones, zone_count, &names());
            let occupied = count_occupied(zone_count, &result.occupancy);
            assert!(occupied <= zone_count);
        }
    }

    #[test]
    fn count_tolerates_short_occupancy() {
        let occupancy = ZoneOccupancy::new(1);
        assert_eq!(count_occupied(5, &occupancy), 0);
    }
}
