//! Spine-Collision Resolver
//!
//! Tests a buffer's actual footprint against the dead zone and slides it
//! outward when it intrudes. A buffer too wide for its page half still gets
//! a position; the warning records that the merge will clip it.

use serde::{Deserialize, Serialize};

use crate::geometry::GeometryModel;

/// Non-fatal record of an automatic spine correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpineIntrusionWarning {
    pub element_id: String,
    pub original: (i64, i64),
    pub corrected: (i64, i64),
    /// The corrected footprint reaches past a canvas edge, so part of the
    /// element is clipped when merged.
    #[serde(default)]
    pub clipped: bool,
}

impl std::fmt::Display for SpineIntrusionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "element '{}' intruded into the spine dead zone; moved from ({}, {}) to ({}, {})",
            self.element_id, self.original.0, self.original.1, self.corrected.0, self.corrected.1
        )?;
        if self.clipped {
            write!(f, " (partly off the canvas)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpineResolver {
    geometry: GeometryModel,
    buffer_margin: i64,
}

impl SpineResolver {
    pub fn new(geometry: GeometryModel, buffer_margin: i64) -> Self {
        Self { geometry, buffer_margin }
    }

    /// Final position for a `size` buffer requested at `position`, plus the
    /// warning when it had to move.
    pub fn place(
        &self,
        id: &str,
        size: (u32, u32),
        position: (i64, i64),
    ) -> ((i64, i64), Option<SpineIntrusionWarning>) {
        let (x, y) = position;
        let (w, h) = (size.0 as i64, size.1 as i64);
        if !self.geometry.overlaps_dead_zone(x, y, w, h) {
            return (position, None);
        }

        let zone = self.geometry.dead_zone();
        let new_x = if x < self.geometry.spine_center() {
            zone.start() - w - self.buffer_margin
        } else {
            zone.end() + self.buffer_margin
        };
        let corrected = (new_x, y);
        let clipped = new_x < 0 || new_x + w > self.geometry.canvas_width as i64;
        let warning = SpineIntrusionWarning {
            element_id: id.to_string(),
            original: position,
            corrected,
            clipped,
        };
        tracing::warn!(
            element_id = id,
            original_x = x,
            original_y = y,
            corrected_x = new_x,
            corrected_y = y,
            "spine intrusion corrected"
        );
        if clipped {
            tracing::warn!(
                element_id = id,
                x = new_x,
                width = w,
                canvas_width = self.geometry.canvas_width,
                "corrected position leaves the canvas; element will be clipped"
            );
        }
        (corrected, Some(warning))
    }
}
