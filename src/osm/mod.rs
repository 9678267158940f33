// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Conversion of OSM data into a [Model](crate::Model).

use log::info;

use crate::population::{self, Adjustments, HomeLayout};
use crate::{Model, PopulationRing};

mod builder;
mod error;
mod reader;
pub mod tags;

pub use builder::Builder;
pub use error::Error;
pub use reader::model::{Element, Node as OsmNode, Way as OsmWay};
pub use reader::{Document, FileFormat};

/// Additional controls for interpreting OSM data as a [Model].
#[derive(Debug, Clone, PartialEq)]
pub struct Options {
    /// Format of the input data.
    pub file_format: FileFormat,

    /// Number of worker threads used for ingestion; zero uses all available cores.
    pub workers: usize,

    /// Buildings with a smaller footprint (in square miles) are considered mistagged and dropped.
    pub min_building_area: f64,

    /// Buildings further than this many miles from any street are dropped.
    pub max_snap_distance: f64,

    /// Distance in miles between synthetic homes along a street.
    pub home_spacing: f64,

    /// Footprint of synthetic homes, in square feet.
    pub home_sq_footage: i64,

    /// Distance in miles between a street and its synthetic homes.
    pub home_setback: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            file_format: FileFormat::Unknown,
            workers: 0,
            min_building_area: 1.8e-5,
            max_snap_distance: 0.1,
            home_spacing: 0.014,
            home_sq_footage: 1000,
            home_setback: 0.01,
        }
    }
}

impl Options {
    pub(crate) fn worker_count(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }

    pub(crate) fn home_layout(&self) -> HomeLayout {
        HomeLayout {
            spacing: self.home_spacing,
            sq_footage: self.home_sq_footage,
            setback: self.home_setback,
        }
    }
}

/// Runs the whole ingestion pipeline: applies ring remaps, extracts nodes, streets
/// and buildings from the document, places synthetic homes on empty residential
/// streets and distributes ring populations over homes.
pub fn build_model(
    doc: &Document,
    mut rings: Vec<PopulationRing>,
    adjustments: &Adjustments,
    options: &Options,
) -> Result<Model, Error> {
    adjustments.apply_remaps(&mut rings)?;

    let mut b = Builder::new(options, rings);
    b.extract_nodes(doc);
    b.extract_ways(doc)?;
    b.extract_buildings(doc, adjustments)?;
    b.generate_homes(doc);

    let outcomes = population::distribute(&b.rings, &mut b.buildings);
    let target: i64 = outcomes.iter().map(|o| o.target).sum();
    let assigned: i64 = outcomes.iter().map(|o| o.assigned).sum();
    info!("Distributed {} of {} people", assigned, target);

    b.into_model()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Location, PathFinder, Point, WayKind};

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {{
            let (a, b) = ($a, $b);
            assert!(((a - b).abs() < 1e-6), "assertion failed: {} ≈ {}", a, b)
        }};
    }

    const TOWN_XML: &[u8] = include_bytes!("reader/test_fixtures/town.osm");

    fn town_ring() -> PopulationRing {
        PopulationRing::rectangle(
            1,
            1,
            10,
            Point::new(39.01, -84.01),
            Point::new(39.0, -84.0),
            "town".to_string(),
        )
    }

    fn options(workers: usize) -> Options {
        Options {
            file_format: FileFormat::Xml,
            workers,
            ..Options::default()
        }
    }

    fn load(workers: usize, adjustments: &Adjustments) -> Model {
        let options = options(workers);
        let doc = Document::from_buffer(&options, TOWN_XML).unwrap();
        build_model(&doc, vec![town_ring()], adjustments, &options).unwrap()
    }

    fn node_index(m: &Model, osm_id: i64) -> usize {
        m.nodes.iter().position(|n| n.osm_id == osm_id).unwrap()
    }

    fn osm_ids(m: &Model, way: i64) -> Vec<i64> {
        m.ways[&way].nodes.iter().map(|&i| m.nodes[i as usize].osm_id).collect()
    }

    #[test]
    fn test_streets() {
        let m = load(3, &Adjustments::default());

        // The footway and all building outlines are not streets
        assert_eq!(m.ways.keys().copied().collect::<Vec<_>>(), vec![100, 101, 102, 104, 105]);
        assert_eq!(m.nodes.len(), 8);

        assert_eq!(osm_ids(&m, 100), vec![1, 2, 3]);
        assert_eq!(osm_ids(&m, 104), vec![8, 5]);

        let oak = &m.ways[&101];
        assert_eq!(oak.kind, WayKind::Residential);
        assert!(oak.is_one_way);
        assert_eq!(oak.max_speed, 25);

        let reversed = &m.ways[&104];
        assert!(reversed.is_one_way);

        let primary = &m.ways[&105];
        assert_eq!(primary.kind, WayKind::Primary);
        assert_eq!(primary.max_speed, 40);
        assert!(!primary.is_one_way);

        let dead_ends: Vec<i64> = m.ways.values().filter(|w| w.is_dead_end).map(|w| w.id).collect();
        assert_eq!(dead_ends, vec![102]);
        assert!(m.ways.values().all(|w| !w.has_loop));
    }

    #[test]
    fn test_ref_counts() {
        let m = load(2, &Adjustments::default());

        for (osm_id, expected) in [(1, 2), (2, 2), (3, 2), (4, 1), (5, 2), (6, 1), (8, 2), (9, 1)] {
            assert_eq!(m.nodes[node_index(&m, osm_id)].ref_count, expected, "node {}", osm_id);
        }

        // Every node's count matches its occurrences in the way table
        for (idx, n) in m.nodes.iter().enumerate() {
            let occurrences = m
                .ways
                .values()
                .flat_map(|w| w.nodes.iter())
                .filter(|&&i| i as usize == idx)
                .count();
            assert_eq!(n.ref_count as usize, occurrences);
        }
    }

    #[test]
    fn test_buildings() {
        let m = load(4, &Adjustments::default());

        // 202 is too small, 203 is a warehouse, 205 is not closed, 206 is outside of the ring
        for id in [202, 203, 205, 206] {
            assert!(!m.buildings.contains_key(&id), "building {} should be dropped", id);
        }

        let house = &m.buildings[&200];
        assert!(house.is_home);
        assert_eq!(house.levels, Some(2));
        assert_eq!(house.way_id, 100);
        assert_eq!(house.ring, Some(0));
        assert_almost_eq!(house.snap.lat, 39.002);
        assert_almost_eq!(house.snap.lon, -84.0065);
        assert!((house.sq_footage - 12394).abs() <= 2);

        // Snapped from the tagged entrance rather than the centroid
        let flats = &m.buildings[&201];
        assert!(flats.is_home);
        assert_eq!(flats.way_id, 101);
        assert_almost_eq!(flats.snap.lat, 39.0049);
        assert_almost_eq!(flats.snap.lon, -84.002);

        let school = &m.buildings[&204];
        assert!(!school.is_home);
        assert_eq!(school.way_id, 100);
        assert_eq!(school.population, 0);

        assert_eq!(m.buildings[&207].way_id, 105);

        assert_eq!(m.ways[&100].num_buildings, 2);
        assert_eq!(m.ways[&101].num_buildings, 1);
        assert_eq!(m.ways[&102].num_buildings, 0);
        assert_eq!(m.ways[&105].num_buildings, 1);
    }

    #[test]
    fn test_synthetic_homes() {
        let m = load(2, &Adjustments::default());

        // Only the residential way 104 had no buildings
        let synthetic: Vec<_> = m.buildings.values().filter(|b| b.id > 207).collect();
        assert_eq!(synthetic.len(), 30);
        assert!(synthetic.iter().all(|b| b.way_id == 104 && b.is_home && b.sq_footage == 1000));
        assert!(synthetic.iter().all(|b| b.snap.lat == 39.008));
        assert_eq!(m.ways[&104].num_buildings, 30);
        assert_eq!(m.ways[&102].num_buildings, 0);
    }

    #[test]
    fn test_population() {
        let m = load(3, &Adjustments::default());

        let total: i64 = m.buildings.values().map(|b| b.population).sum();
        assert_eq!(total, 10);
        assert_eq!(m.buildings[&200].population, 4);
        assert_eq!(m.buildings[&201].population, 2);
        assert_eq!(m.buildings[&207].population, 2);

        let stats = m.rings[0].stats;
        assert_eq!(stats.buildings, 34);
        assert_eq!(stats.homes, 33);
    }

    #[test]
    fn test_adjustments() {
        let adjustments = Adjustments::parse("ignore 207\nignore 1:199").unwrap();
        let m = load(2, &adjustments);
        assert!(!m.buildings.contains_key(&207));
        assert!(m.buildings.contains_key(&200));
        assert_eq!(m.ways[&105].num_buildings, 0);

        // Synthetic homes never reuse ids of ignored or dropped buildings
        let synthetic: Vec<_> = m.buildings.values().filter(|b| b.way_id == 104).collect();
        assert_eq!(synthetic.len(), 30);
        assert!(synthetic.iter().all(|b| b.id > 207));

        let adjustments = Adjustments::parse("remap 0 -1").unwrap();
        let m = load(2, &adjustments);
        assert_eq!(m.rings[0].population, 0);
        assert!(m.buildings.values().all(|b| b.population == 0));
    }

    #[test]
    fn test_independent_of_worker_count() {
        let reference = load(1, &Adjustments::default());
        for workers in [2, 3, 5, 8] {
            assert_eq!(load(workers, &Adjustments::default()), reference);
        }
    }

    #[test]
    fn test_unknown_node_is_fatal() {
        const DATA: &[u8] = b"<osm><node id='1' lat='0' lon='0'/>\
            <way id='2'><nd ref='1'/><nd ref='3'/><tag k='highway' v='residential'/></way></osm>";

        let options = options(2);
        let doc = Document::from_buffer(&options, DATA).unwrap();
        let result = build_model(&doc, vec![town_ring()], &Adjustments::default(), &options);
        assert!(matches!(result, Err(Error::UnknownNode { way: 2, node: 3 })));
    }

    #[test]
    fn test_route_through_town() {
        let m = load(2, &Adjustments::default());
        let finder = PathFinder::new(&m);

        // 200 -> 2 -> 3 -> 201, against no one-way restrictions
        let path = finder
            .find_best_path(Location::Building(200), Location::Building(201), false, None)
            .unwrap();
        let visited: Vec<Location> = path.segments.iter().map(|s| s.location).collect();
        assert_eq!(
            visited,
            vec![
                Location::Building(200),
                Location::Node(node_index(&m, 2)),
                Location::Node(node_index(&m, 3)),
                Location::Building(201),
            ]
        );

        // Streets around 201 are all one-way, leading nowhere
        let back = finder
            .find_best_path(Location::Building(201), Location::Building(200), false, None)
            .unwrap();
        assert!(back.is_empty());
    }
}
