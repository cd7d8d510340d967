//! Geometry Model
//!
//! Canvas size, the binding dead zone and the per-page safe zones are
//! process-wide constants. Nothing here is derived per spread.

use serde::{Deserialize, Serialize};

pub const CANVAS_WIDTH: u32 = 3400;
pub const CANVAS_HEIGHT: u32 = 2200;
pub const SPINE_CENTER: i64 = 1700;
pub const SPINE_WIDTH: i64 = 462;
pub const DEAD_ZONE_START: i64 = SPINE_CENTER - SPINE_WIDTH / 2;
pub const DEAD_ZONE_END: i64 = SPINE_CENTER + SPINE_WIDTH / 2;
pub const SAFE_MARGIN: i64 = 150;

/// Which half of the spread an element belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Page {
    Left,
    Right,
}

impl Page {
    pub fn key(&self) -> &'static str {
        match self {
            Page::Left => "left_page",
            Page::Right => "right_page",
        }
    }
}

/// The band at the spine no content may finally occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadZone {
    pub center_x: i64,
    pub width: i64,
}

impl DeadZone {
    pub fn start(&self) -> i64 {
        self.center_x - self.width / 2
    }

    pub fn end(&self) -> i64 {
        self.center_x + self.width / 2
    }

    /// Half-open interval test: touching an edge is not an overlap.
    pub fn intersects(&self, left: i64, right: i64) -> bool {
        left < self.end() && right > self.start()
    }
}

/// Inclusive rectangle inside which a page's element bounding boxes belong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeZone {
    pub x: (i64, i64),
    pub y: (i64, i64),
}

impl SafeZone {
    pub fn contains(&self, rect: &Rect) -> bool {
        rect.x >= self.x.0 && rect.right() <= self.x.1 && rect.y >= self.y.0 && rect.bottom() <= self.y.1
    }
}

/// Axis-aligned box in canvas pixels, origin at the top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i64,
    pub y: i64,
    pub w: i64,
    pub h: i64,
}

impl Rect {
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self { x, y, w, h }
    }

    pub fn right(&self) -> i64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.h
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryModel {
    pub canvas_width: u32,
    pub canvas_height: u32,
    dead_zone: DeadZone,
}

impl GeometryModel {
    pub fn standard() -> Self {
        Self {
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
            dead_zone: DeadZone {
                center_x: SPINE_CENTER,
                width: SPINE_WIDTH,
            },
        }
    }

    pub fn dead_zone(&self) -> DeadZone {
        self.dead_zone
    }

    pub fn safe_zone(&self, page: Page) -> SafeZone {
        let y = (SAFE_MARGIN, self.canvas_height as i64 - SAFE_MARGIN);
        match page {
            Page::Left => SafeZone {
                x: (SAFE_MARGIN, self.dead_zone.start()),
                y,
            },
            Page::Right => SafeZone {
                x: (self.dead_zone.end(), self.canvas_width as i64 - SAFE_MARGIN),
                y,
            },
        }
    }

    /// Only the horizontal extent matters; the dead zone spans the full height.
    pub fn overlaps_dead_zone(&self, x: i64, _y: i64, w: i64, _h: i64) -> bool {
        self.dead_zone.intersects(x, x + w)
    }

    pub fn spine_center(&self) -> i64 {
        self.dead_zone.center_x
    }
}

impl Default for GeometryModel {
    fn default() -> Self {
        Self::standard()
    }
}

/// Size of the bounding box of a `w`x`h` rectangle rotated by `degrees`,
/// rounded up to whole pixels.
pub fn rotated_extent(w: u32, h: u32, degrees: f64) -> (u32, u32) {
    if degrees == 0.0 {
        return (w, h);
    }
    let rad = degrees.to_radians();
    let (sin, cos) = (rad.sin().abs(), rad.cos().abs());
    let (w, h) = (w as f64, h as f64);
    let rw = w * cos + h * sin;
    let rh = w * sin + h * cos;
    // Trim float noise so a 90 degree turn of 600x400 is 400x600, not 401x601.
    let snap = |v: f64| (v - 1e-6).ceil().max(1.0) as u32;
    (snap(rw), snap(rh))
}

/// Final rendered footprint of a raster element: rotation expansion, then
/// border padding, then shadow offset. Matches the buffer the transform
/// stage produces for the same inputs.
pub fn footprint(
    dims: (u32, u32),
    rotation_degrees: f64,
    border_width: u32,
    shadow_offset: Option<(i32, i32)>,
) -> (u32, u32) {
    let (mut w, mut h) = rotated_extent(dims.0, dims.1, rotation_degrees);
    let pad = border_width.saturating_mul(2);
    w = w.saturating_add(pad);
    h = h.saturating_add(pad);
    if let Some((dx, dy)) = shadow_offset {
        w = w.saturating_add(dx.unsigned_abs());
        h = h.saturating_add(dy.unsigned_abs());
    }
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_footprint_saturates() {
        assert_eq!(footprint((600, 400), 0.0, 4, Some((3, -3))), (611, 411));
        assert_eq!(footprint((10, 10), 0.0, u32::MAX, None), (u32::MAX, u32::MAX));
        assert_eq!(
            footprint((10, 10), 0.0, 0, Some((i32::MIN, i32::MIN))),
            (10 + 2_147_483_648, 10 + 2_147_483_648)
        );
    }

    #[test]
    fn test_dead_zone_constants() {
        let geometry = GeometryModel::standard();
        assert_eq!(geometry.dead_zone().start(), 1469);
        assert_eq!(geometry.dead_zone().end(), 1931);
        assert_eq!(DEAD_ZONE_START, 1469);
        assert_eq!(DEAD_ZONE_END, 1931);
    }

    #[test]
    fn test_safe_zones() {
        let geometry = GeometryModel::standard();
        let left = geometry.safe_zone(Page::Left);
        let right = geometry.safe_zone(Page::Right);
        assert_eq!(left.x, (150, 1469));
        assert_eq!(right.x, (1931, 3250));
        assert_eq!(left.y, (150, 2050));
        assert_eq!(right.y, (150, 2050));
    }

    #[test]
    fn test_overlap_is_half_open() {
        let geometry = GeometryModel::standard();
        assert!(geometry.overlaps_dead_zone(1000, 0, 600, 10));
        assert!(!geometry.overlaps_dead_zone(869, 0, 600, 10));
        assert!(!geometry.overlaps_dead_zone(1931, 0, 100, 10));
        assert!(geometry.overlaps_dead_zone(1930, 0, 100, 10));
    }

    #[test]
    fn test_rotated_extent() {
        assert_eq!(rotated_extent(600, 400, 0.0), (600, 400));
        assert_eq!(rotated_extent(600, 400, 90.0), (400, 600));
        let (w, h) = rotated_extent(100, 100, 45.0);
        assert_eq!((w, h), (142, 142));
    }

    #[test]
    fn test_footprint_includes_border_and_shadow() {
        assert_eq!(footprint((100, 50), 0.0, 4, Some((3, 3))), (111, 61));
        assert_eq!(footprint((100, 50), 0.0, 0, Some((-3, 2))), (103, 52));
    }
}
