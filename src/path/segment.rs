// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::queue::Prioritized;

/// Cost of a route which does not exist.
pub const UNREACHABLE: f64 = 1000.0;

/// A place a route can start at, end at or pass through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Location {
    /// Street node, by its index in [Model::nodes](crate::Model::nodes).
    Node(usize),

    /// Snap point of a building, by the building id.
    Building(i64),
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(idx) => write!(f, "node #{}", idx),
            Self::Building(id) => write!(f, "building {}", id),
        }
    }
}

/// One hop of a route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathSegment {
    pub location: Location,

    /// Way used to arrive at [PathSegment::location]; [None] for a source node.
    pub way_id: Option<i64>,

    /// Cumulative cost from the start of the route: miles, or hours when routing by time.
    pub distance: f64,

    /// Unique (within a single search) id of this segment.
    pub seg_id: usize,

    /// Segment this one was reached from.
    pub parent_seg_id: Option<usize>,
}

impl Prioritized<Location> for PathSegment {
    #[inline]
    fn key(&self) -> Location {
        self.location
    }

    /// Cheaper segments go first; ties go to the earlier discovered segment.
    fn precedes(&self, other: &Self) -> bool {
        match self.distance.total_cmp(&other.distance) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.seg_id < other.seg_id,
        }
    }
}

/// Route found by [PathFinder](super::PathFinder), from the source to the destination.
/// An empty path means that the destination is unreachable.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub segments: Vec<PathSegment>,
}

impl Path {
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total cost of the route, or [UNREACHABLE] for empty paths.
    pub fn cost(&self) -> f64 {
        self.segments.last().map_or(UNREACHABLE, |s| s.distance)
    }

    /// Number of hops between consecutive segments.
    #[inline]
    pub fn hops(&self) -> usize {
        self.segments.len().saturating_sub(1)
    }

    #[inline]
    pub fn locations(&self) -> impl Iterator<Item = Location> + '_ {
        self.segments.iter().map(|s| s.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(distance: f64, seg_id: usize) -> PathSegment {
        PathSegment {
            location: Location::Node(seg_id),
            way_id: None,
            distance,
            seg_id,
            parent_seg_id: None,
        }
    }

    #[test]
    fn test_precedes() {
        assert!(segment(1.0, 5).precedes(&segment(2.0, 1)));
        assert!(!segment(2.0, 1).precedes(&segment(1.0, 5)));
        assert!(segment(1.0, 1).precedes(&segment(1.0, 2)));
        assert!(!segment(1.0, 2).precedes(&segment(1.0, 1)));
    }

    #[test]
    fn test_path_cost() {
        assert_eq!(Path::default().cost(), UNREACHABLE);
        assert_eq!(Path::default().hops(), 0);

        let p = Path {
            segments: vec![segment(0.0, 0), segment(0.5, 1), segment(1.25, 2)],
        };
        assert_eq!(p.cost(), 1.25);
        assert_eq!(p.hops(), 2);
        assert_eq!(
            p.locations().collect::<Vec<_>>(),
            vec![Location::Node(0), Location::Node(1), Location::Node(2)]
        );
    }
}
