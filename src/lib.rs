// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Population-aware street graphs from [OpenStreetMap](https://www.openstreetmap.org/) data.
//!
//! Popgraph reads OSM XML and a set of [population rings](PopulationRing)
//! (regions with a target headcount), and produces a [Model]: streets as [ways](Way)
//! over [nodes](Node), and [buildings](Building) snapped to their nearest street
//! with synthetic population distributed across homes. Models are saved in a simple
//! line-oriented text format and can be queried with the [PathFinder].
//!
//! # Example
//!
//! ```no_run
//! let rings = popgraph::model::read_rings_from_file("path/to/rings.txt")
//!     .expect("failed to load rings");
//! let options = popgraph::osm::Options::default();
//! let adjustments = popgraph::population::Adjustments::default();
//! let document = popgraph::osm::Document::from_file(&options, "path/to/city.osm")
//!     .expect("failed to load city.osm");
//! let model = popgraph::osm::build_model(&document, rings, &adjustments, &options)
//!     .expect("failed to build the model");
//!
//! let finder = popgraph::PathFinder::new(&model);
//! let path = finder
//!     .find_best_path(
//!         popgraph::Location::Building(1001),
//!         popgraph::Location::Building(1002),
//!         false,
//!         None,
//!     )
//!     .expect("invalid buildings");
//!
//! println!("Distance: {:.3} mi", path.cost());
//! ```

mod building;
mod distance;
pub mod geojson;
pub mod geometry;
pub mod model;
pub mod osm;
pub mod path;
pub mod population;
mod queue;
mod ring;
mod way;

pub use building::Building;
pub use distance::{earth_distance, MILES_PER_LAT};
pub use geometry::{Bounds, Point, Polygon};
pub use model::Model;
pub use path::{Location, Path, PathError, PathFinder, PathSegment, SearchLimits, UNREACHABLE};
pub use queue::{IndexedPriorityQueue, Prioritized};
pub use ring::{PopulationRing, RingStats};
pub use way::{Way, WayKind};

/// Represents a street vertex (or a building vertex during ingestion).
///
/// `ref_count` is the number of occurrences of this node across all street [ways](Way),
/// counting every repetition of the node in a looping way separately.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub osm_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub is_entrance: bool,
    pub ref_count: u32,
}

impl Node {
    #[inline]
    pub fn position(&self) -> Point {
        Point::new(self.lat, self.lon)
    }
}
