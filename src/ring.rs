// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::geometry::{Point, Polygon};
use crate::Building;

/// Distance in miles within which a street node counts as "near" a ring.
pub const NEAR_RING_DISTANCE: f64 = 0.2;

/// Building totals of a [PopulationRing].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RingStats {
    pub buildings: u32,
    pub building_sq_ft: i64,
    pub homes: u32,
    pub home_sq_ft: i64,
}

/// A region carrying a target headcount, produced by an external ring generator.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationRing {
    /// Id assigned by the ring generator.
    pub ring_id: i64,

    /// Id of the community shape this ring was cut from.
    pub shape_id: i64,

    /// Target headcount.
    pub population: i64,

    pub polygon: Polygon,

    /// Free-form description of where the ring came from.
    pub info: String,

    pub stats: RingStats,
}

impl PopulationRing {
    /// Creates a rectangular ring spanning the two provided corners.
    pub fn rectangle(
        ring_id: i64,
        shape_id: i64,
        population: i64,
        top_left: Point,
        bottom_right: Point,
        info: String,
    ) -> Self {
        Self {
            ring_id,
            shape_id,
            population,
            polygon: Polygon::rectangle(top_left, bottom_right),
            info,
            stats: RingStats::default(),
        }
    }

    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        self.polygon.contains(p)
    }

    /// Checks if the point is inside the ring, or within [NEAR_RING_DISTANCE] of its boundary.
    #[inline]
    pub fn contains_or_near(&self, p: Point) -> bool {
        self.polygon.contains(p) || self.polygon.is_near(p, NEAR_RING_DISTANCE)
    }
}

/// Recomputes [RingStats] of every ring from the buildings assigned to it.
pub(crate) fn recompute_stats<'a, I: IntoIterator<Item = &'a Building>>(
    rings: &mut [PopulationRing],
    buildings: I,
) {
    for ring in rings.iter_mut() {
        ring.stats = RingStats::default();
    }

    for b in buildings {
        let Some(ring) = b.ring.and_then(|idx| rings.get_mut(idx)) else {
            continue;
        };

        ring.stats.buildings += 1;
        ring.stats.building_sq_ft += b.floor_area();
        if b.is_home {
            ring.stats.homes += 1;
            ring.stats.home_sq_ft += b.floor_area();
        }
    }
}
