// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::geometry::{Point, Polygon};

/// A building snapped to its nearest street.
#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub id: i64,

    /// Footprint of the building, first vertex repeated at the end.
    pub footprint: Polygon,

    /// Number of floors, if tagged.
    pub levels: Option<u32>,

    /// Footprint area in square feet.
    pub sq_footage: i64,

    pub population: i64,
    pub is_home: bool,

    /// Index of the owning [PopulationRing](crate::PopulationRing).
    pub ring: Option<usize>,

    /// Id of the nearest street [Way](crate::Way).
    pub way_id: i64,

    /// Point on [Building::way_id] closest to the building's entrance.
    pub snap: Point,
}

impl Building {
    /// Square footage over all floors. Buildings without known levels count as single-storey.
    #[inline]
    pub fn floor_area(&self) -> i64 {
        self.sq_footage * self.levels.unwrap_or(1).max(1) as i64
    }

    #[inline]
    pub fn centroid(&self) -> Option<Point> {
        self.footprint.centroid()
    }
}
