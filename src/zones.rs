//! Zone store: parking-space polygons and the frame size they are drawn in.
//!
//! The zone file is plain text with three recognised line shapes:
//!
//! ```text
//! 0: [(120.0,80.5), (240.0,80.5), (240.0,200.0), (120.0,200.0)]
//! 1: [(260,80), (380,80), (380,200), (260,200)]
//! number_of_zone: 2
//! frame_width: 1280
//! frame_height: 720
//! ```
//!
//! Zone entries are found anywhere on a line, so one line may carry several
//! entries or trailing text. `frame_width` must be immediately followed by
//! `frame_height`. Blank lines and `#` comments are skipped. Any other line,
//! or a line with a malformed zone entry, is handled according to the
//! caller's [`UnmatchedLinePolicy`].

use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::error::PsmsError;
use crate::frame::FrameSize;
use crate::geometry::PixelPoint;

/// What to do with a zone file line that matches no pattern.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum UnmatchedLinePolicy {
    #[default]
    Ignore,
    Warn,
    Reject,
}

/// One parking space.
#[derive(Clone, Debug, PartialEq)]
pub struct Zone {
    id: u32,
    points: Vec<(f64, f64)>,
    pixels: Vec<PixelPoint>,
}

impl Zone {
    /// Build a zone from its declared vertices.
    ///
    /// Needs at least three finite points, each of which must snap to a pixel
    /// inside the `i32` range.
    pub fn new(id: u32, points: Vec<(f64, f64)>) -> Result<Self> {
        if points.len() < 3 {
            anyhow::bail!("zone {} needs at least 3 points, got {}", id, points.len());
        }
        let pixels = points
            .iter()
            .map(|&(x, y)| PixelPoint::truncate(x, y))
            .collect::<Option<Vec<_>>>()
            .with_context(|| format!("zone {} has a non-finite or out-of-range vertex", id))?;
        Ok(Self { id, points, pixels })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Vertices as declared in the zone file.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Vertices snapped to pixels; containment and drawing use these.
    pub fn pixel_polygon(&self) -> &[PixelPoint] {
        &self.pixels
    }
}

/// Zones in declaration order plus the frame size their coordinates refer to.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneSet {
    zones: Vec<Zone>,
    frame_size: FrameSize,
}

impl ZoneSet {
    pub fn new(frame_size: FrameSize) -> Self {
        Self {
            zones: Vec::new(),
            frame_size,
        }
    }

    /// Build a set from zones in declaration order.
    ///
    /// A repeated identifier replaces the earlier zone's points but keeps the
    /// earlier position.
    pub fn from_zones(frame_size: FrameSize, zones: impl IntoIterator<Item = Zone>) -> Self {
        let mut set = Self::new(frame_size);
        for zone in zones {
            set.insert(zone);
        }
        set
    }

    /// Returns the replaced zone when the identifier was already present.
    pub(crate) fn insert(&mut self, zone: Zone) -> Option<Zone> {
        match self.position(zone.id) {
            Some(idx) => Some(std::mem::replace(&mut self.zones[idx], zone)),
            None => {
                self.zones.push(zone);
                None
            }
        }
    }

    pub fn frame_size(&self) -> FrameSize {
        self.frame_size
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Zone> {
        self.zones.iter()
    }

    pub fn get(&self, id: u32) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.id == id)
    }

    /// Iteration index of the zone with `id`.
    pub fn position(&self, id: u32) -> Option<usize> {
        self.zones.iter().position(|zone| zone.id == id)
    }
}

impl<'a> IntoIterator for &'a ZoneSet {
    type Item = &'a Zone;
    type IntoIter = std::slice::Iter<'a, Zone>;

    fn into_iter(self) -> Self::IntoIter {
        self.zones.iter()
    }
}

/// Parsed zone file.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneConfig {
    pub zones: ZoneSet,
    /// Declared number of spaces. Occupancy is always sized from this value.
    pub zone_count: usize,
}

impl ZoneConfig {
    pub fn frame_size(&self) -> FrameSize {
        self.zones.frame_size()
    }
}

/// Read and parse a zone file.
pub fn load(path: impl AsRef<Path>, policy: UnmatchedLinePolicy) -> Result<ZoneConfig> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PsmsError::ConfigNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read zone configuration {}", path.display()))?;
    let config = parse(&text, policy)
        .with_context(|| format!("invalid zone configuration {}", path.display()))?;
    log::info!(
        "loaded {} zone(s) from {} (declared {}, frame {})",
        config.zones.len(),
        path.display(),
        config.zone_count,
        config.frame_size()
    );
    Ok(config)
}

/// Parse zone file text.
pub fn parse(text: &str, policy: UnmatchedLinePolicy) -> Result<ZoneConfig> {
    let mut zones: Vec<Zone> = Vec::new();
    let mut zone_count: Option<usize> = None;
    let mut frame_size: Option<FrameSize> = None;

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx];
        let line_no = idx + 1;
        idx += 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let entries = zone_entries(line);
        if !entries.is_empty() {
            let mut malformed = false;
            for entry in entries {
                match entry {
                    Some(zone) => zones.push(zone),
                    None => malformed = true,
                }
            }
            if malformed {
                handle_unmatched(policy, line_no, line)?;
            }
            continue;
        }

        if let Some(count) = capture_number(count_re(), line) {
            if zone_count.is_none() {
                zone_count = Some(count as usize);
            }
            continue;
        }

        if let Some(width) = capture_number(width_re(), line) {
            let height = lines.get(idx).and_then(|next| capture_number(height_re(), next));
            if let Some(height) = height {
                idx += 1;
                if frame_size.is_none() {
                    frame_size = Some(FrameSize::new(width, height));
                }
                continue;
            }
        }

        handle_unmatched(policy, line_no, line)?;
    }

    let frame_size = frame_size
        .filter(|size| !size.is_empty())
        .ok_or(PsmsError::MissingFrameDimensions)?;

    let mut set = ZoneSet::new(frame_size);
    for zone in zones {
        let id = zone.id;
        if set.insert(zone).is_some() {
            log::warn!("zone {} declared more than once; keeping the last points", id);
        }
    }

    let zone_count = match zone_count {
        Some(count) => count,
        None => {
            log::warn!(
                "zone configuration has no number_of_zone line; using {} parsed zone(s)",
                set.len()
            );
            set.len()
        }
    };
    if zone_count < set.len() {
        log::warn!(
            "number_of_zone is {} but {} zones are defined; zones past index {} are never counted",
            zone_count,
            set.len(),
            zone_count
        );
    }

    Ok(ZoneConfig {
        zones: set,
        zone_count,
    })
}

/// Every `<id>: [...]` entry on the line; `None` marks an entry that is not a valid zone.
fn zone_entries(line: &str) -> Vec<Option<Zone>> {
    zone_re()
        .captures_iter(line)
        .map(|caps| parse_zone_entry(&caps[1], &caps[2]))
        .collect()
}

fn parse_zone_entry(id: &str, body: &str) -> Option<Zone> {
    let id: u32 = id.parse().ok()?;
    let body = body.trim();

    let mut points = Vec::new();
    for caps in point_re().captures_iter(body) {
        let x: f64 = caps[1].trim().parse().ok()?;
        let y: f64 = caps[2].trim().parse().ok()?;
        points.push((x, y));
    }
    // Every parenthesised group has to be a point.
    if points.len() != body.matches('(').count() {
        return None;
    }
    Zone::new(id, points).ok()
}

fn capture_number(re: &Regex, line: &str) -> Option<u32> {
    re.captures(line).and_then(|caps| caps[1].parse().ok())
}

fn handle_unmatched(policy: UnmatchedLinePolicy, line_no: usize, line: &str) -> Result<()> {
    match policy {
        UnmatchedLinePolicy::Ignore => {
            log::trace!("zone configuration line {} ignored: {:?}", line_no, line);
            Ok(())
        }
        UnmatchedLinePolicy::Warn => {
            log::warn!("zone configuration line {} ignored: {:?}", line_no, line);
            Ok(())
        }
        UnmatchedLinePolicy::Reject => Err(PsmsError::MalformedZoneLine {
            line: line_no,
            text: line.to_string(),
        }
        .into()),
    }
}

fn zone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+):\s*\[(.*?)\]").expect("zone regex"))
}

fn point_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(([^(),]+),([^(),]+)\)").expect("point regex"))
}

fn count_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^number_of_zone:\s*(\d+)$").expect("count regex"))
}

fn width_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^frame_width:\s*(\d+)$").expect("width regex"))
}

fn height_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^frame_height:\s*(\d+)$").expect("height regex"))
}
