// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Barrier, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ScopedJoinHandle};

use log::{debug, info};

use super::reader::model;
use super::tags::{self, Direction};
use super::{Document, Error, Options};
use crate::geometry::{snap_to_segment, Point, Polygon, SQ_FEET_PER_SQ_MILE};
use crate::population::{homes_along, Adjustments};
use crate::{Building, Model, Node, PopulationRing, Way, WayKind};

/// Helper object holding the state of converting an OSM [Document] into a [Model].
///
/// Conversion runs in phases, each spread over [Options::workers] threads:
/// 1. [Builder::extract_nodes],
/// 2. [Builder::extract_ways],
/// 3. [Builder::extract_buildings],
///
/// followed by [Builder::generate_homes] and [Builder::into_model].
#[derive(Debug)]
pub struct Builder<'a> {
    options: &'a Options,
    pub(crate) rings: Vec<PopulationRing>,
    pub(crate) nodes: BTreeMap<i64, Node>,
    pub(crate) ways: BTreeMap<i64, Way>,
    pub(crate) buildings: BTreeMap<i64, Building>,

    /// Ids of ways with at least one node inside (or near) a ring, per ring.
    pub(crate) ring_ways: Vec<BTreeSet<i64>>,
}

impl<'a> Builder<'a> {
    pub fn new(options: &'a Options, rings: Vec<PopulationRing>) -> Self {
        let ring_ways = vec![BTreeSet::new(); rings.len()];
        Self {
            options,
            rings,
            nodes: BTreeMap::default(),
            ways: BTreeMap::default(),
            buildings: BTreeMap::default(),
            ring_ways,
        }
    }

    /// Phase 1: converts all OSM nodes into [Nodes](Node).
    pub fn extract_nodes(&mut self, doc: &Document) {
        let workers = self.options.worker_count();
        let elements = doc.elements();
        let merged = Mutex::new(std::mem::take(&mut self.nodes));

        thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let merged = &merged;
                    s.spawn(move || {
                        let local: Vec<Node> = elements
                            .iter()
                            .skip(worker)
                            .step_by(workers)
                            .filter_map(|e| match e {
                                model::Element::Node(n) => Some(convert_node(n)),
                                _ => None,
                            })
                            .collect();

                        let mut nodes = lock(merged);
                        for n in local {
                            nodes.insert(n.osm_id, n);
                        }
                    })
                })
                .collect();
            join_all(handles);
        });

        self.nodes = merged.into_inner().unwrap_or_else(PoisonError::into_inner);
        info!("Extracted {} nodes", self.nodes.len());
    }

    /// Phase 2: converts OSM ways describing drivable streets into [Ways](Way),
    /// counts node references and associates ways with population rings.
    ///
    /// Dead-end detection needs reference counts from all threads, and runs
    /// only after every thread has merged its ways.
    pub fn extract_ways(&mut self, doc: &Document) -> Result<(), Error> {
        let workers = self.options.worker_count();
        let elements = doc.elements();
        let nodes = &self.nodes;
        let rings = &self.rings;

        let ways = Mutex::new(std::mem::take(&mut self.ways));
        let ring_ways = Mutex::new(std::mem::take(&mut self.ring_ways));
        let ref_counts: Mutex<HashMap<i64, u32>> = Mutex::new(HashMap::default());
        let barrier = Barrier::new(workers);

        let results = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let (ways, ring_ways, ref_counts, barrier) =
                        (&ways, &ring_ways, &ref_counts, &barrier);

                    s.spawn(move || -> Result<usize, Error> {
                        let local = elements
                            .iter()
                            .skip(worker)
                            .step_by(workers)
                            .filter_map(|e| match e {
                                model::Element::Way(w) => convert_street(w, nodes, rings).transpose(),
                                _ => None,
                            })
                            .collect::<Result<Vec<_>, Error>>();

                        let ids: Vec<i64> = match &local {
                            Ok(local) => {
                                merge_streets(local, ways, ring_ways, ref_counts);
                                local.iter().map(|(w, _)| w.id).collect()
                            }
                            Err(_) => Vec::new(),
                        };

                        // Every thread must arrive, even after a failure
                        barrier.wait();
                        local?;

                        let counts = lock(ref_counts);
                        let mut ways = lock(ways);
                        let mut dead_ends = 0;
                        for id in ids {
                            if let Some(w) = ways.get_mut(&id) {
                                let shared = w
                                    .nodes
                                    .iter()
                                    .filter(|&n| counts.get(n).copied().unwrap_or(0) > 1)
                                    .count();
                                w.is_dead_end = shared < 2;
                                if w.is_dead_end {
                                    dead_ends += 1;
                                }
                            }
                        }
                        Ok(dead_ends)
                    })
                })
                .collect();
            join_all(handles)
        });

        self.ways = ways.into_inner().unwrap_or_else(PoisonError::into_inner);
        self.ring_ways = ring_ways.into_inner().unwrap_or_else(PoisonError::into_inner);
        let dead_ends: usize = results.into_iter().sum::<Result<usize, Error>>()?;

        for (id, count) in ref_counts.into_inner().unwrap_or_else(PoisonError::into_inner) {
            if let Some(n) = self.nodes.get_mut(&id) {
                n.ref_count += count;
            }
        }

        info!("Extracted {} ways ({} dead ends)", self.ways.len(), dead_ends);
        Ok(())
    }

    /// Phase 3: converts OSM ways describing buildings into [Buildings](Building)
    /// snapped to their nearest street.
    pub fn extract_buildings(&mut self, doc: &Document, adjustments: &Adjustments) -> Result<(), Error> {
        let workers = self.options.worker_count();
        let elements = doc.elements();
        let ctx = BuildingContext {
            options: self.options,
            adjustments,
            nodes: &self.nodes,
            ways: &self.ways,
            rings: &self.rings,
            ring_ways: &self.ring_ways,
        };

        let merged = Mutex::new(std::mem::take(&mut self.buildings));
        let way_counts: Mutex<HashMap<i64, u32>> = Mutex::new(HashMap::default());

        let results = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker| {
                    let (ctx, merged, way_counts) = (&ctx, &merged, &way_counts);
                    s.spawn(move || -> Result<(), Error> {
                        let local = elements
                            .iter()
                            .skip(worker)
                            .step_by(workers)
                            .filter_map(|e| match e {
                                model::Element::Way(w) => ctx.convert_building(w).transpose(),
                                _ => None,
                            })
                            .collect::<Result<Vec<_>, Error>>()?;

                        {
                            let mut counts = lock(way_counts);
                            for b in &local {
                                *counts.entry(b.way_id).or_default() += 1;
                            }
                        }

                        let mut buildings = lock(merged);
                        for b in local {
                            buildings.insert(b.id, b);
                        }
                        Ok(())
                    })
                })
                .collect();
            join_all(handles)
        });

        self.buildings = merged.into_inner().unwrap_or_else(PoisonError::into_inner);
        results.into_iter().collect::<Result<(), Error>>()?;

        for (id, count) in way_counts.into_inner().unwrap_or_else(PoisonError::into_inner) {
            if let Some(w) = self.ways.get_mut(&id) {
                w.num_buildings += count;
            }
        }

        info!("Extracted {} buildings", self.buildings.len());
        Ok(())
    }

    /// Places synthetic homes along residential ways without any buildings.
    ///
    /// Homes get ids above every OSM way id of the document, so they never
    /// collide with ignored or discarded buildings.
    pub fn generate_homes(&mut self, doc: &Document) {
        let layout = self.options.home_layout();
        let max_way_id = doc
            .elements()
            .iter()
            .filter_map(|e| match e {
                model::Element::Way(w) => Some(w.id),
                _ => None,
            })
            .chain(self.buildings.keys().copied())
            .max();
        let mut next_id = max_way_id.map_or(1, |id| id + 1);
        let mut generated = 0;

        for way in self.ways.values_mut() {
            if way.kind != WayKind::Residential || way.num_buildings > 0 {
                continue;
            }

            let street: Vec<Point> = way
                .nodes
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|n| n.position())
                .collect();

            for site in homes_along(&street, &layout) {
                let Some(ring) = self.rings.iter().position(|r| r.contains(site.snap)) else {
                    continue;
                };

                let id = next_id;
                next_id += 1;
                self.buildings.insert(
                    id,
                    Building {
                        id,
                        footprint: site.footprint,
                        levels: Some(1),
                        sq_footage: layout.sq_footage,
                        population: 0,
                        is_home: true,
                        ring: Some(ring),
                        way_id: way.id,
                        snap: site.snap,
                    },
                );
                way.num_buildings += 1;
                generated += 1;
            }
        }

        info!("Generated {} synthetic homes", generated);
    }

    /// Finishes the conversion: street nodes are re-indexed to their
    /// position in the model's node table (in the order of first use by
    /// ways sorted by id), nodes not used by any street are dropped,
    /// and ring statistics are recomputed.
    pub fn into_model(self) -> Result<Model, Error> {
        let mut index: HashMap<i64, usize> = HashMap::default();
        let mut nodes: Vec<Node> = Vec::default();
        let mut ways = self.ways;

        for way in ways.values_mut() {
            for id in way.nodes.iter_mut() {
                let idx = match index.get(&*id) {
                    Some(&idx) => idx,
                    None => {
                        let n = self.nodes.get(&*id).ok_or(Error::UnknownNode {
                            way: way.id,
                            node: *id,
                        })?;
                        nodes.push(*n);
                        index.insert(*id, nodes.len() - 1);
                        nodes.len() - 1
                    }
                };
                *id = idx as i64;
            }
        }

        let mut rings = self.rings;
        crate::ring::recompute_stats(&mut rings, self.buildings.values());
        Ok(Model::new(rings, nodes, ways, self.buildings)?)
    }
}

/// Read-only state shared by all threads during building extraction.
struct BuildingContext<'a> {
    options: &'a Options,
    adjustments: &'a Adjustments,
    nodes: &'a BTreeMap<i64, Node>,
    ways: &'a BTreeMap<i64, Way>,
    rings: &'a [PopulationRing],
    ring_ways: &'a [BTreeSet<i64>],
}

impl<'a> BuildingContext<'a> {
    fn convert_building(&self, w: &model::Way) -> Result<Option<Building>, Error> {
        let Some(tags) = tags::building(w.id, &w.tags) else {
            return Ok(None);
        };

        if self.adjustments.is_ignored(w.id) {
            debug!("building {}: ignored by adjustments", w.id);
            return Ok(None);
        }

        if tags.is_ignored() {
            debug!("building {}: ignored type {:?}", w.id, tags.building_type);
            return Ok(None);
        }

        let vertices = w
            .nodes
            .iter()
            .map(|id| lookup_node(self.nodes, w.id, *id))
            .collect::<Result<Vec<_>, Error>>()?;

        if w.nodes.len() < 4 || w.nodes.first() != w.nodes.last() {
            debug!("building {}: not a closed polygon", w.id);
            return Ok(None);
        }

        let footprint = Polygon::new(vertices.iter().map(|n| n.position()).collect());
        let area = footprint.area();
        if area < self.options.min_building_area {
            debug!("building {}: area {:.2e} sq mi below threshold", w.id, area);
            return Ok(None);
        }

        let Some(centroid) = footprint.centroid() else {
            return Ok(None);
        };

        let Some(ring) = self.rings.iter().position(|r| r.contains(centroid)) else {
            debug!("building {}: outside of all population rings", w.id);
            return Ok(None);
        };

        let entrance = vertices
            .iter()
            .find(|n| n.is_entrance)
            .map(|n| n.position())
            .unwrap_or(centroid);

        let Some((way_id, snap, distance)) = self.nearest_way(entrance, ring) else {
            debug!("building {}: no streets in ring {}", w.id, ring);
            return Ok(None);
        };

        if distance > self.options.max_snap_distance {
            debug!("building {}: nearest street {} is {:.3} mi away", w.id, way_id, distance);
            return Ok(None);
        }

        Ok(Some(Building {
            id: w.id,
            footprint,
            levels: tags.levels,
            sq_footage: (area * SQ_FEET_PER_SQ_MILE).round() as i64,
            population: 0,
            is_home: tags.is_home(),
            ring: Some(ring),
            way_id,
            snap,
        }))
    }

    /// Finds the street (among those associated with the ring) closest to the point.
    /// Returns the way id, the snapped point and the distance in miles.
    fn nearest_way(&self, p: Point, ring: usize) -> Option<(i64, Point, f64)> {
        let mut best: Option<(i64, Point, f64)> = None;

        for way_id in self.ring_ways.get(ring)? {
            let Some(way) = self.ways.get(way_id) else {
                continue;
            };

            let positions: Vec<Point> = way
                .nodes
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .map(|n| n.position())
                .collect();

            for pair in positions.windows(2) {
                let (snap, distance) = snap_to_segment(p, pair[0], pair[1]);
                if best.map_or(true, |(_, _, d)| distance < d) {
                    best = Some((*way_id, snap, distance));
                }
            }
        }

        best
    }
}

fn convert_node(n: &model::Node) -> Node {
    Node {
        osm_id: n.id,
        lat: n.lat,
        lon: n.lon,
        is_entrance: n.tags.get("entrance").is_some_and(|v| v == "yes"),
        ref_count: 0,
    }
}

fn lookup_node(nodes: &BTreeMap<i64, Node>, way: i64, node: i64) -> Result<Node, Error> {
    nodes.get(&node).copied().ok_or(Error::UnknownNode { way, node })
}

/// Interprets an OSM way as a street. Returns the street together with indices of
/// rings it is associated with, or [None] if the way is not a street of the model.
fn convert_street(
    w: &model::Way,
    nodes: &BTreeMap<i64, Node>,
    rings: &[PopulationRing],
) -> Result<Option<(Way, Vec<usize>)>, Error> {
    let positions = w
        .nodes
        .iter()
        .map(|id| lookup_node(nodes, w.id, *id).map(|n| n.position()))
        .collect::<Result<Vec<_>, Error>>()?;

    let Some(street) = tags::street(w.id, &w.tags) else {
        return Ok(None);
    };

    if w.nodes.len() < 2 {
        debug!("way {}: less than 2 nodes", w.id);
        return Ok(None);
    }

    let mut node_ids = w.nodes.clone();
    if street.direction == Direction::Backward {
        node_ids.reverse();
    }

    let mut seen = HashSet::with_capacity(node_ids.len());
    let has_loop = !node_ids.iter().all(|id| seen.insert(*id));

    let ring_indices: Vec<usize> = rings
        .iter()
        .enumerate()
        .filter(|(_, r)| positions.iter().any(|&p| r.contains_or_near(p)))
        .map(|(i, _)| i)
        .collect();

    if ring_indices.is_empty() {
        debug!("way {}: outside of all population rings", w.id);
        return Ok(None);
    }

    let way = Way {
        id: w.id,
        nodes: node_ids,
        kind: street.kind,
        max_speed: street.max_speed,
        is_one_way: street.direction != Direction::Both,
        is_dead_end: false,
        has_loop,
        num_buildings: 0,
    };
    Ok(Some((way, ring_indices)))
}

fn merge_streets(
    local: &[(Way, Vec<usize>)],
    ways: &Mutex<BTreeMap<i64, Way>>,
    ring_ways: &Mutex<Vec<BTreeSet<i64>>>,
    ref_counts: &Mutex<HashMap<i64, u32>>,
) {
    {
        let mut ways = lock(ways);
        for (w, _) in local {
            ways.insert(w.id, w.clone());
        }
    }

    {
        let mut counts = lock(ref_counts);
        for (w, _) in local {
            for n in &w.nodes {
                *counts.entry(*n).or_default() += 1;
            }
        }
    }

    let mut ring_ways = lock(ring_ways);
    for (w, rings) in local {
        for &r in rings {
            ring_ways[r].insert(w.id);
        }
    }
}

/// Locks a mutex; a poisoned lock is still usable, as the panic is re-raised by [join_all].
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn join_all<T>(handles: Vec<ScopedJoinHandle<'_, T>>) -> Vec<T> {
    handles
        .into_iter()
        .map(|h| match h.join() {
            Ok(v) => v,
            Err(e) => std::panic::resume_unwind(e),
        })
        .collect()
}
