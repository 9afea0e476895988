//! Frame annotation.
//!
//! Rendering is split in two: [`plan_overlay`] turns zones and the frame's
//! classification into a list of [`DrawOp`]s, and [`Renderer`] rasterizes
//! that list onto the RGB frame with `imageproc`. Labels and counters use the
//! bundled DejaVu Sans unless another TrueType font is loaded.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect;

use crate::frame::Frame;
use crate::geometry::{self, PixelPoint};
use crate::occupancy::{Classification, OccupancySummary};
use crate::zones::ZoneSet;

pub type Color = [u8; 3];

const HUD_ORIGIN: (i32, i32) = (25, 25);
const HUD_LINE_HEIGHT: i32 = 28;

static DEFAULT_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// One primitive of the overlay plan, in frame pixel coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Polyline {
        points: Vec<PixelPoint>,
        closed: bool,
        thickness: u32,
        color: Color,
    },
    Rect {
        top_left: PixelPoint,
        bottom_right: PixelPoint,
        thickness: u32,
        color: Color,
    },
    Dot {
        center: PixelPoint,
        radius: u32,
        color: Color,
    },
    /// Text whose baseline starts at `anchor`.
    Label {
        anchor: PixelPoint,
        text: String,
        px: f32,
        color: Color,
    },
}

/// Colours and sizes used by the overlay.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayStyle {
    pub zone_outline: Color,
    pub zone_label: Color,
    pub object_box: Color,
    pub centroid: Color,
    pub text: Color,
    pub line_thickness: u32,
    pub text_px: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            zone_outline: [0, 255, 0],
            zone_label: [255, 0, 0],
            object_box: [100, 100, 255],
            centroid: [255, 100, 255],
            text: [255, 255, 255],
            line_thickness: 2,
            text_px: 20.0,
        }
    }
}

/// Optional overlay layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OverlayOptions {
    /// Zone outlines with their identifiers.
    pub draw_zones: bool,
    /// One `zone: <i> | nv: <n>` line per declared zone under the counters.
    pub draw_zone_info: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self {
            draw_zones: true,
            draw_zone_info: false,
        }
    }
}

/// Build the overlay for one frame.
pub fn plan_overlay(
    zones: &ZoneSet,
    classification: &Classification,
    summary: &OccupancySummary,
    options: OverlayOptions,
    style: &OverlayStyle,
) -> Vec<DrawOp> {
    let mut ops = Vec::new();

    if options.draw_zones {
        for zone in zones {
            let polygon = zone.pixel_polygon();
            ops.push(DrawOp::Polyline {
                points: polygon.to_vec(),
                closed: true,
                thickness: style.line_thickness,
                color: style.zone_outline,
            });
            if let Some(anchor) = geometry::vertex_mean(polygon) {
                ops.push(DrawOp::Label {
                    anchor,
                    text: zone.id().to_string(),
                    px: style.text_px * 0.9,
                    color: style.zone_label,
                });
            }
        }
    }

    for object in &classification.annotated {
        let det = &object.detection;
        let top_left = PixelPoint::new(det.x1 as i32, det.y1 as i32);
        let bottom_right = PixelPoint::new(det.x2 as i32, det.y2 as i32);
        ops.push(DrawOp::Dot {
            center: object.centroid,
            radius: 3,
            color: style.centroid,
        });
        ops.push(DrawOp::Rect {
            top_left,
            bottom_right,
            thickness: style.line_thickness,
            color: style.object_box,
        });
        ops.push(DrawOp::Label {
            anchor: top_left,
            text: format!("{} {:.2}%", object.class_name, det.confidence),
            px: style.text_px,
            color: style.text,
        });
    }

    let mut hud = vec![
        format!("vacant: {}", summary.vacant),
        format!("occupied: {}", summary.occupied),
    ];
    if options.draw_zone_info {
        hud.extend((0..summary.total).map(|index| {
            format!(
                "zone: {} | nv: {}",
                index,
                classification.occupancy.occupants(index).len()
            )
        }));
    }
    for (row, text) in hud.into_iter().enumerate() {
        ops.push(DrawOp::Label {
            anchor: PixelPoint::new(HUD_ORIGIN.0, HUD_ORIGIN.1 + HUD_LINE_HEIGHT * row as i32),
            text,
            px: style.text_px,
            color: style.text,
        });
    }

    ops
}

/// Draws overlays onto frames.
pub struct Renderer {
    options: OverlayOptions,
    style: OverlayStyle,
    font: Option<FontArc>,
}

impl Renderer {
    /// Renderer using the bundled font.
    pub fn new(options: OverlayOptions) -> Self {
        let font = FontArc::try_from_slice(DEFAULT_FONT)
            .map_err(|e| log::warn!("bundled font unusable, text is not drawn: {}", e))
            .ok();
        Self {
            options,
            style: OverlayStyle::default(),
            font,
        }
    }

    pub fn with_style(mut self, style: OverlayStyle) -> Self {
        self.style = style;
        self
    }

    /// Replace the bundled font with a TrueType/OpenType font file.
    pub fn with_font_path(mut self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Plan and draw the overlay for this frame.
    pub fn render(
        &self,
        frame: &mut Frame,
        zones: &ZoneSet,
        classification: &Classification,
        summary: &OccupancySummary,
    ) {
        let ops = plan_overlay(zones, classification, summary, self.options, &self.style);
        self.rasterize(frame.image_mut(), &ops);
    }

    pub fn rasterize(&self, image: &mut RgbImage, ops: &[DrawOp]) {
        let bounds = Bounds::of(image);
        for op in ops {
            match op {
                DrawOp::Polyline {
                    points,
                    closed,
                    thickness,
                    color,
                } => {
                    let segments = if *closed {
                        points.len()
                    } else {
                        points.len().saturating_sub(1)
                    };
                    for i in 0..segments {
                        let a = points[i];
                        let b = points[(i + 1) % points.len()];
                        draw_thick_line(image, &bounds, a, b, *thickness, Rgb(*color));
                    }
                }
                DrawOp::Rect {
                    top_left,
                    bottom_right,
                    thickness,
                    color,
                } => draw_thick_rect(image, &bounds, *top_left, *bottom_right, *thickness, Rgb(*color)),
                DrawOp::Dot {
                    center,
                    radius,
                    color,
                } => {
                    let (x, y) = bounds.clamp(*center);
                    draw_filled_circle_mut(image, (x, y), *radius as i32, Rgb(*color));
                }
                DrawOp::Label {
                    anchor,
                    text,
                    px,
                    color,
                } => {
                    let Some(font) = &self.font else {
                        continue;
                    };
                    let (x, y) = bounds.clamp(*anchor);
                    let top = y.saturating_sub(px.round() as i32);
                    draw_text_mut(image, Rgb(*color), x, top, PxScale::from(*px), font, text);
                }
            }
        }
    }
}

/// Clamp window for coordinates so far off-frame geometry stays cheap to draw.
struct Bounds {
    min_x: i64,
    max_x: i64,
    min_y: i64,
    max_y: i64,
}

impl Bounds {
    fn of(image: &RgbImage) -> Self {
        let (w, h) = (i64::from(image.width()), i64::from(image.height()));
        Self {
            min_x: -w,
            max_x: 2 * w,
            min_y: -h,
            max_y: 2 * h,
        }
    }

    fn clamp(&self, p: PixelPoint) -> (i32, i32) {
        (
            i64::from(p.x).clamp(self.min_x, self.max_x) as i32,
            i64::from(p.y).clamp(self.min_y, self.max_y) as i32,
        )
    }
}

fn draw_thick_line(
    image: &mut RgbImage,
    bounds: &Bounds,
    a: PixelPoint,
    b: PixelPoint,
    thickness: u32,
    color: Rgb<u8>,
) {
    let (ax, ay) = bounds.clamp(a);
    let (bx, by) = bounds.clamp(b);
    let half = (thickness.max(1) / 2) as i32;
    let spread = if thickness <= 1 { 0 } else { half };
    for dy in -spread..=spread {
        for dx in -spread..=spread {
            draw_line_segment_mut(
                image,
                ((ax + dx) as f32, (ay + dy) as f32),
                ((bx + dx) as f32, (by + dy) as f32),
                color,
            );
        }
    }
}

fn draw_thick_rect(
    image: &mut RgbImage,
    bounds: &Bounds,
    top_left: PixelPoint,
    bottom_right: PixelPoint,
    thickness: u32,
    color: Rgb<u8>,
) {
    let (x1, y1) = bounds.clamp(top_left);
    let (x2, y2) = bounds.clamp(bottom_right);
    let (left, right) = (x1.min(x2), x1.max(x2));
    let (top, bottom) = (y1.min(y2), y1.max(y2));
    for offset in 0..thickness.max(1) as i32 {
        let w = (right - left + 1 + 2 * offset).max(1) as u32;
        let h = (bottom - top + 1 + 2 * offset).max(1) as u32;
        draw_hollow_rect_mut(image, Rect::at(left - offset, top - offset).of_size(w, h), color);
    }
}
