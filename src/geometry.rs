//! Pixel geometry used by zone containment.
//!
//! Everything here works on integer pixel coordinates. Floating point inputs
//! (zone vertices, detection boxes) are snapped by truncating toward zero,
//! so boundary tests are exact. Coordinates are `i32`; inputs that do not fit
//! are rejected when snapped, and the intermediate products of the edge tests
//! are computed in `i128`, where they cannot overflow.

/// Integer pixel coordinate in frame space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PixelPoint {
    pub x: i32,
    pub y: i32,
}

impl PixelPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Snap a coordinate pair to a pixel, truncating toward zero.
    ///
    /// Returns `None` for NaN, infinite input, or values that truncate
    /// outside the `i32` range.
    pub fn truncate(x: f64, y: f64) -> Option<Self> {
        Some(Self {
            x: snap(x)?,
            y: snap(y)?,
        })
    }
}

fn snap(v: f64) -> Option<i32> {
    let t = v.trunc();
    (f64::from(i32::MIN)..=f64::from(i32::MAX))
        .contains(&t)
        .then_some(t as i32)
}

/// Where a point lies relative to a polygon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Containment {
    Outside,
    Boundary,
    Inside,
}

impl Containment {
    /// Boundary points count as contained.
    pub fn is_contained(self) -> bool {
        !matches!(self, Containment::Outside)
    }
}

/// Integer midpoint of a bounding box.
///
/// Each corner coordinate is truncated toward zero first, then the sums are
/// floor-divided by two. This is not the float midpoint: `(0, 5)` gives `2`.
pub fn box_centroid(x1: f32, y1: f32, x2: f32, y2: f32) -> Option<PixelPoint> {
    let a = PixelPoint::truncate(f64::from(x1), f64::from(y1))?;
    let b = PixelPoint::truncate(f64::from(x2), f64::from(y2))?;
    let mid = |p: i32, q: i32| (i64::from(p) + i64::from(q)).div_euclid(2) as i32;
    Some(PixelPoint::new(mid(a.x, b.x), mid(a.y, b.y)))
}

/// Classify `point` against a closed polygon (last vertex joins the first).
///
/// Uses an even-odd ray cast toward +x after checking every edge for exact
/// incidence. Polygons with fewer than three vertices only have a boundary.
pub fn locate(point: PixelPoint, polygon: &[PixelPoint]) -> Containment {
    let n = polygon.len();
    if n == 0 {
        return Containment::Outside;
    }

    let px = i128::from(point.x);
    let py = i128::from(point.y);
    let mut inside = false;

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];
        if on_segment(point, a, b) {
            return Containment::Boundary;
        }

        let (ax, ay) = (i128::from(a.x), i128::from(a.y));
        let (bx, by) = (i128::from(b.x), i128::from(b.y));
        if (ay > py) != (by > py) {
            let dy = by - ay;
            let lhs = (px - ax) * dy;
            let rhs = (py - ay) * (bx - ax);
            let crosses = if dy > 0 { lhs < rhs } else { lhs > rhs };
            if crosses {
                inside = !inside;
            }
        }
    }

    if inside && n >= 3 {
        Containment::Inside
    } else {
        Containment::Outside
    }
}

/// Boundary-inclusive containment test.
pub fn contains(polygon: &[PixelPoint], point: PixelPoint) -> bool {
    locate(point, polygon).is_contained()
}

/// Mean of the polygon's vertices, truncated toward zero. Used to anchor labels.
pub fn vertex_mean(polygon: &[PixelPoint]) -> Option<PixelPoint> {
    if polygon.is_empty() {
        return None;
    }
    let n = polygon.len() as i128;
    let sx: i128 = polygon.iter().map(|p| i128::from(p.x)).sum();
    let sy: i128 = polygon.iter().map(|p| i128::from(p.y)).sum();
    Some(PixelPoint::new((sx / n) as i32, (sy / n) as i32))
}

fn on_segment(p: PixelPoint, a: PixelPoint, b: PixelPoint) -> bool {
    let (px, py) = (i128::from(p.x), i128::from(p.y));
    let (ax, ay) = (i128::from(a.x), i128::from(a.y));
    let (bx, by) = (i128::from(b.x), i128::from(b.y));

    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    cross == 0
        && px >= ax.min(bx)
        && px <= ax.max(bx)
        && py >= ay.min(by)
        && py <= ay.max(by)
}
