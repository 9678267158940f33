// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! The routable [Model] and its line-oriented text format.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;

use log::info;

use crate::{Building, Node, Point, PopulationRing, Way};

mod text;

pub use text::{read_rings, read_rings_from_file, FORMAT_VERSION};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("inconsistent model: {0}")]
    Inconsistent(String),
}

/// Streets, buildings and population rings of a modeled region.
///
/// Way nodes are indices into [Model::nodes]. Every way has at least 2 nodes,
/// every building points at an existing way and, if assigned to a ring,
/// at an existing ring. These invariants are checked by [Model::new].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Model {
    pub rings: Vec<PopulationRing>,
    pub nodes: Vec<Node>,
    pub ways: BTreeMap<i64, Way>,
    pub buildings: BTreeMap<i64, Building>,

    /// Ids of ways passing through every node, sorted by way id.
    node_ways: Vec<Vec<i64>>,
}

impl Model {
    /// Validates references between the provided tables and builds the node-to-ways index.
    pub fn new(
        rings: Vec<PopulationRing>,
        nodes: Vec<Node>,
        ways: BTreeMap<i64, Way>,
        buildings: BTreeMap<i64, Building>,
    ) -> Result<Self, Error> {
        let mut node_ways: Vec<Vec<i64>> = vec![Vec::new(); nodes.len()];

        for way in ways.values() {
            if way.nodes.len() < 2 {
                return Err(Error::Inconsistent(format!("way {} has less than 2 nodes", way.id)));
            }

            for &n in &way.nodes {
                let Some(entry) = usize::try_from(n).ok().and_then(|n| node_ways.get_mut(n)) else {
                    return Err(Error::Inconsistent(format!(
                        "way {} references node index {} (model has {} nodes)",
                        way.id,
                        n,
                        nodes.len()
                    )));
                };

                // Ways are visited in id order, so a looping way can only be the last entry
                if entry.last() != Some(&way.id) {
                    entry.push(way.id);
                }
            }
        }

        for b in buildings.values() {
            if !ways.contains_key(&b.way_id) {
                return Err(Error::Inconsistent(format!(
                    "building {} references unknown way {}",
                    b.id, b.way_id
                )));
            }

            if let Some(ring) = b.ring.filter(|&r| r >= rings.len()) {
                return Err(Error::Inconsistent(format!(
                    "building {} references ring {} (model has {} rings)",
                    b.id,
                    ring,
                    rings.len()
                )));
            }
        }

        Ok(Self {
            rings,
            nodes,
            ways,
            buildings,
            node_ways,
        })
    }

    #[inline]
    pub fn node(&self, idx: usize) -> Option<&Node> {
        self.nodes.get(idx)
    }

    #[inline]
    pub fn way(&self, id: i64) -> Option<&Way> {
        self.ways.get(&id)
    }

    #[inline]
    pub fn building(&self, id: i64) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Ids of all ways passing through the node with the provided index.
    pub fn ways_at(&self, idx: usize) -> &[i64] {
        self.node_ways.get(idx).map_or(&[], |w| w.as_slice())
    }

    /// Positions of all nodes of a way, in way order.
    pub fn way_points(&self, way: &Way) -> Vec<Point> {
        way.nodes
            .iter()
            .filter_map(|&n| self.nodes.get(n as usize))
            .map(|n| n.position())
            .collect()
    }

    /// Reads a model from its text representation.
    pub fn read<R: BufRead>(reader: R) -> Result<Self, Error> {
        text::read(reader)
    }

    /// Writes the text representation of the model.
    pub fn write<W: Write>(&self, writer: W) -> Result<(), Error> {
        text::write(self, writer)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let f = File::open(path)?;
        let model = Self::read(io::BufReader::new(f))?;
        info!(
            "Loaded model with {} rings, {} nodes, {} ways and {} buildings",
            model.rings.len(),
            model.nodes.len(),
            model.ways.len(),
            model.buildings.len(),
        );
        Ok(model)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let f = File::create(path)?;
        let mut w = io::BufWriter::new(f);
        self.write(&mut w)?;
        w.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Polygon, WayKind};

    pub(super) fn node(osm_id: i64, lat: f64, lon: f64) -> Node {
        Node {
            osm_id,
            lat,
            lon,
            is_entrance: false,
            ref_count: 1,
        }
    }

    pub(super) fn way(id: i64, nodes: Vec<i64>) -> Way {
        Way {
            id,
            nodes,
            kind: WayKind::Residential,
            max_speed: 25,
            is_one_way: false,
            is_dead_end: false,
            has_loop: false,
            num_buildings: 0,
        }
    }

    pub(super) fn building(id: i64, way_id: i64, ring: Option<usize>) -> Building {
        Building {
            id,
            footprint: Polygon::default(),
            levels: None,
            sq_footage: 1000,
            population: 0,
            is_home: true,
            ring,
            way_id,
            snap: Point::new(0.0, 0.0),
        }
    }

    fn table<T, F: Fn(&T) -> i64>(items: Vec<T>, key: F) -> BTreeMap<i64, T> {
        items.into_iter().map(|i| (key(&i), i)).collect()
    }

    #[test]
    fn test_node_ways_index() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 0.0, 1.0), node(3, 1.0, 1.0), node(4, 1.0, 0.0)];
        let mut looping = way(30, vec![1, 2, 3, 1]);
        looping.has_loop = true;
        let ways = table(vec![way(10, vec![0, 1]), looping, way(20, vec![3, 1])], |w| w.id);

        let m = Model::new(Vec::new(), nodes, ways, BTreeMap::default()).unwrap();
        assert_eq!(m.ways_at(0), &[10]);
        assert_eq!(m.ways_at(1), &[10, 20, 30]);
        assert_eq!(m.ways_at(2), &[30]);
        assert_eq!(m.ways_at(3), &[20, 30]);
        assert!(m.ways_at(4).is_empty());
    }

    #[test]
    fn test_rejects_bad_node_index() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 0.0, 1.0)];
        let ways = table(vec![way(10, vec![0, 2])], |w| w.id);
        let r = Model::new(Vec::new(), nodes, ways, BTreeMap::default());
        assert!(matches!(r, Err(Error::Inconsistent(_))));
    }

    #[test]
    fn test_rejects_short_way() {
        let nodes = vec![node(1, 0.0, 0.0)];
        let ways = table(vec![way(10, vec![0])], |w| w.id);
        let r = Model::new(Vec::new(), nodes, ways, BTreeMap::default());
        assert!(matches!(r, Err(Error::Inconsistent(_))));
    }

    #[test]
    fn test_rejects_dangling_building() {
        let nodes = vec![node(1, 0.0, 0.0), node(2, 0.0, 1.0)];
        let ways = table(vec![way(10, vec![0, 1])], |w| w.id);

        let r = Model::new(
            Vec::new(),
            nodes.clone(),
            ways.clone(),
            table(vec![building(1, 11, None)], |b| b.id),
        );
        assert!(matches!(r, Err(Error::Inconsistent(_))));

        let r = Model::new(Vec::new(), nodes, ways, table(vec![building(1, 10, Some(0))], |b| b.id));
        assert!(matches!(r, Err(Error::Inconsistent(_))));
    }
}
