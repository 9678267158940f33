// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Best-path search between buildings and street nodes of a [Model].

use std::collections::{HashMap, HashSet};

use crate::geometry::snap_to_segment;
use crate::{Bounds, IndexedPriorityQueue, Model, Point, Way};

mod error;
mod segment;

pub use error::PathError;
pub use segment::{Location, Path, PathSegment, UNREACHABLE};

/// Endpoints closer than this many miles are searched without [SearchLimits].
const MIN_LIMITED_SEPARATION: f64 = 0.01;

/// Restricts the search to a rectangle around both endpoints, widened by
/// `min_dist + separation * scale` miles in every direction.
///
/// Nodes outside of the rectangle are never expanded, which keeps the
/// explored area of large models small, at the cost of missing routes with long detours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchLimits {
    pub min_dist: f64,
    pub scale: f64,
}

impl SearchLimits {
    fn bounds(&self, a: Point, b: Point) -> Option<Bounds> {
        let separation = a.distance(&b);
        if separation <= MIN_LIMITED_SEPARATION {
            None
        } else {
            Some(Bounds::around(a, b).expand(self.min_dist + separation * self.scale))
        }
    }
}

/// Position along a way: at node `after`, plus `offset` miles towards the following node.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Stop {
    after: usize,
    offset: f64,
}

impl Stop {
    #[inline]
    fn at_node(&self) -> bool {
        self.offset == 0.0
    }

    #[inline]
    fn not_after(&self, other: &Stop) -> bool {
        (self.after, self.offset) <= (other.after, other.offset)
    }
}

/// Route endpoint resolved against the model.
#[derive(Debug)]
struct Endpoint {
    location: Location,
    point: Point,

    /// Way a building is snapped to; [None] for nodes.
    way_id: Option<i64>,

    /// All positions of the endpoint on every way it lies on.
    stops: Vec<(i64, Vec<Stop>)>,
}

impl Endpoint {
    fn stops_on(&self, way_id: i64) -> Option<&[Stop]> {
        self.stops
            .iter()
            .find(|(w, _)| *w == way_id)
            .map(|(_, s)| s.as_slice())
    }
}

/// Answers best-path queries over a borrowed [Model].
///
/// All search state is private to a single [PathFinder::find_best_path] call,
/// so any number of finders may share one model across threads.
#[derive(Debug, Clone, Copy)]
pub struct PathFinder<'m> {
    model: &'m Model,
}

impl<'m> PathFinder<'m> {
    pub fn new(model: &'m Model) -> Self {
        Self { model }
    }

    #[inline]
    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Finds the cheapest route from `src` to `dest`.
    ///
    /// The cost is the great-circle length of the route in miles, or, if `use_time` is set,
    /// the travel time in hours at the speed limits of traversed ways.
    /// One-way ways are only traversed in the order of their nodes.
    ///
    /// Endpoints sharing a way are connected along that way, without a graph search.
    /// If the way is one-way and `dest` lies before `src`, the result is empty.
    ///
    /// Returns an empty [Path] if `dest` can't be reached.
    pub fn find_best_path(
        &self,
        src: Location,
        dest: Location,
        use_time: bool,
        limits: Option<SearchLimits>,
    ) -> Result<Path, PathError> {
        let from = self.resolve(src)?;
        let to = self.resolve(dest)?;

        if src == dest {
            return Ok(Path {
                segments: vec![PathSegment {
                    location: src,
                    way_id: from.way_id,
                    distance: 0.0,
                    seg_id: 0,
                    parent_seg_id: None,
                }],
            });
        }

        if let Some(path) = self.same_way_path(&from, &to, use_time) {
            return Ok(path);
        }

        let bounds = limits.and_then(|l| l.bounds(from.point, to.point));
        Ok(Search::new(self.model, &from, &to, use_time, bounds).run())
    }

    fn resolve(&self, location: Location) -> Result<Endpoint, PathError> {
        match location {
            Location::Node(idx) => {
                let node = self.model.node(idx).ok_or(PathError::InvalidNode(idx))?;
                let stops = self
                    .model
                    .ways_at(idx)
                    .iter()
                    .filter_map(|&id| self.model.way(id))
                    .map(|way| {
                        let stops = way
                            .positions_of(idx as i64)
                            .into_iter()
                            .map(|after| Stop { after, offset: 0.0 })
                            .collect();
                        (way.id, stops)
                    })
                    .collect();

                Ok(Endpoint {
                    location,
                    point: node.position(),
                    way_id: None,
                    stops,
                })
            }

            Location::Building(id) => {
                let b = self.model.building(id).ok_or(PathError::InvalidBuilding(id))?;
                let way = self.model.way(b.way_id).ok_or(PathError::InvalidWay(b.way_id))?;
                let points = self.model.way_points(way);
                if points.len() < 2 || points.len() != way.nodes.len() {
                    return Err(PathError::InvalidWay(way.id));
                }

                let mut best = (0, f64::INFINITY);
                for (k, pair) in points.windows(2).enumerate() {
                    let (_, d) = snap_to_segment(b.snap, pair[0], pair[1]);
                    if d < best.1 {
                        best = (k, d);
                    }
                }

                let stop = Stop {
                    after: best.0,
                    offset: points[best.0].distance(&b.snap),
                };

                Ok(Endpoint {
                    location,
                    point: b.snap,
                    way_id: Some(way.id),
                    stops: vec![(way.id, vec![stop])],
                })
            }
        }
    }

    /// Connects endpoints lying on a common way. Returns [None] if there is no such way,
    /// and an empty path if one-way restrictions forbid every connection.
    fn same_way_path(&self, from: &Endpoint, to: &Endpoint, use_time: bool) -> Option<Path> {
        let mut shared = false;
        let mut best: Option<Path> = None;

        for (way_id, from_stops) in &from.stops {
            let Some(to_stops) = to.stops_on(*way_id) else {
                continue;
            };
            let Some(way) = self.model.way(*way_id) else {
                continue;
            };
            shared = true;

            for s in from_stops {
                for d in to_stops {
                    let Some(path) = self.walk_way(way, from, *s, to, *d, use_time) else {
                        continue;
                    };
                    if best.as_ref().map_or(true, |b| path.cost() < b.cost()) {
                        best = Some(path);
                    }
                }
            }
        }

        if shared {
            Some(best.unwrap_or_default())
        } else {
            None
        }
    }

    fn walk_way(
        &self,
        way: &Way,
        from: &Endpoint,
        s: Stop,
        to: &Endpoint,
        d: Stop,
        use_time: bool,
    ) -> Option<Path> {
        let forward = s.not_after(&d);
        if !forward && way.is_one_way {
            return None;
        }

        let between: Vec<usize> = if forward {
            ((s.after + 1)..=d.after)
                .filter(|&i| !(i == d.after && d.at_node()))
                .collect()
        } else {
            ((d.after + 1)..=s.after)
                .rev()
                .filter(|&i| !(i == s.after && s.at_node()))
                .collect()
        };

        let mut stops = Vec::with_capacity(between.len() + 2);
        stops.push((from.location, from.point));
        for i in between {
            let idx = *way.nodes.get(i)? as usize;
            stops.push((Location::Node(idx), self.model.node(idx)?.position()));
        }
        stops.push((to.location, to.point));

        let mut segments: Vec<PathSegment> = Vec::with_capacity(stops.len());
        for (seg_id, &(location, point)) in stops.iter().enumerate() {
            let (distance, way_id) = match segments.last() {
                None => (0.0, from.way_id),
                Some(prev) => {
                    let prev_point = stops[seg_id - 1].1;
                    (prev.distance + edge_cost(way, prev_point, point, use_time), Some(way.id))
                }
            };

            segments.push(PathSegment {
                location,
                way_id,
                distance,
                seg_id,
                parent_seg_id: seg_id.checked_sub(1),
            });
        }

        Some(Path { segments })
    }
}

/// State of a single Dijkstra search.
struct Search<'a> {
    model: &'a Model,
    from: &'a Endpoint,
    to: &'a Endpoint,
    use_time: bool,
    bounds: Option<Bounds>,

    frontier: IndexedPriorityQueue<PathSegment, Location>,
    explored: HashSet<Location>,
    explored_segments: HashMap<usize, PathSegment>,
    next_seg_id: usize,
}

impl<'a> Search<'a> {
    fn new(
        model: &'a Model,
        from: &'a Endpoint,
        to: &'a Endpoint,
        use_time: bool,
        bounds: Option<Bounds>,
    ) -> Self {
        Self {
            model,
            from,
            to,
            use_time,
            bounds,
            frontier: IndexedPriorityQueue::default(),
            explored: HashSet::default(),
            explored_segments: HashMap::default(),
            next_seg_id: 0,
        }
    }

    fn run(mut self) -> Path {
        let start = PathSegment {
            location: self.from.location,
            way_id: self.from.way_id,
            distance: 0.0,
            seg_id: self.seg_id(),
            parent_seg_id: None,
        };
        self.frontier.push(start);

        while let Some(seg) = self.frontier.pop() {
            if seg.location == self.to.location {
                return self.reconstruct(seg);
            }

            self.explored.insert(seg.location);
            self.explored_segments.insert(seg.seg_id, seg);
            self.expand(&seg);
        }

        Path::default()
    }

    fn expand(&mut self, seg: &PathSegment) {
        match seg.location {
            // Only the source building is ever expanded
            Location::Building(_) => {
                let from = self.from;
                for (way_id, stops) in &from.stops {
                    let Some(way) = self.model.way(*way_id) else {
                        continue;
                    };
                    for stop in stops {
                        self.relax_node(seg, way, stop.after + 1, from.point);
                        if !way.is_one_way {
                            self.relax_node(seg, way, stop.after, from.point);
                        }
                    }
                }
            }

            Location::Node(idx) => {
                let Some(node) = self.model.node(idx) else {
                    return;
                };
                let here = node.position();
                let is_source = seg.parent_seg_id.is_none();

                for &way_id in self.model.ways_at(idx) {
                    let Some(way) = self.model.way(way_id) else {
                        continue;
                    };

                    let entering = !is_source && seg.way_id != Some(way_id);
                    if way.is_dead_end && entering && self.to.stops_on(way_id).is_none() {
                        continue;
                    }

                    for p in way.positions_of(idx as i64) {
                        if p + 1 < way.nodes.len() {
                            self.relax_node(seg, way, p + 1, here);
                        }
                        if p > 0 && !way.is_one_way {
                            self.relax_node(seg, way, p - 1, here);
                        }
                        self.relax_destination(seg, way, p, here);
                    }
                }
            }
        }
    }

    /// Offers the node at position `pos` of `way`, reached from `here`.
    fn relax_node(&mut self, seg: &PathSegment, way: &Way, pos: usize, here: Point) {
        let Some(idx) = way.nodes.get(pos).map(|&n| n as usize) else {
            return;
        };
        let Some(node) = self.model.node(idx) else {
            return;
        };

        let location = Location::Node(idx);
        let there = node.position();
        if location != self.to.location && self.bounds.is_some_and(|b| !b.contains(there)) {
            return;
        }

        let distance = seg.distance + edge_cost(way, here, there, self.use_time);
        self.offer(seg, location, way.id, distance);
    }

    /// Offers the destination building, if it can be reached from position `pos` of `way`.
    fn relax_destination(&mut self, seg: &PathSegment, way: &Way, pos: usize, here: Point) {
        let Location::Building(_) = self.to.location else {
            return;
        };
        let Some(stops) = self.to.stops_on(way.id) else {
            return;
        };

        let reachable = stops
            .iter()
            .any(|s| pos == s.after || (!way.is_one_way && pos == s.after + 1));
        if reachable {
            let distance = seg.distance + edge_cost(way, here, self.to.point, self.use_time);
            self.offer(seg, self.to.location, way.id, distance);
        }
    }

    fn offer(&mut self, parent: &PathSegment, location: Location, way_id: i64, distance: f64) {
        if self.explored.contains(&location) {
            return;
        }
        if self.frontier.at(&location).is_some_and(|s| s.distance <= distance) {
            return;
        }

        let seg_id = self.seg_id();
        self.frontier.push(PathSegment {
            location,
            way_id: Some(way_id),
            distance,
            seg_id,
            parent_seg_id: Some(parent.seg_id),
        });
    }

    fn seg_id(&mut self) -> usize {
        let id = self.next_seg_id;
        self.next_seg_id += 1;
        id
    }

    fn reconstruct(&self, last: PathSegment) -> Path {
        let mut segments = vec![last];
        let mut parent = last.parent_seg_id;

        while let Some(seg) = parent.and_then(|id| self.explored_segments.get(&id)) {
            segments.push(*seg);
            parent = seg.parent_seg_id;
        }

        segments.reverse();
        Path { segments }
    }
}

/// Cost of traveling between two points along a way: miles, or hours at the way's speed limit.
fn edge_cost(way: &Way, a: Point, b: Point, use_time: bool) -> f64 {
    let miles = a.distance(&b);
    if use_time {
        miles / way.max_speed.max(1) as f64
    } else {
        miles
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{earth_distance, Building, Node, Polygon, WayKind};

    macro_rules! assert_almost_eq {
        ($a:expr, $b:expr) => {
            assert!(
                (($a - $b).abs() < 1e-9),
                "assertion failed: {} ≈ {}",
                $a,
                $b
            )
        };
    }

    fn street(id: i64, nodes: Vec<i64>, is_one_way: bool) -> Way {
        let mut seen = HashSet::new();
        let has_loop = !nodes.iter().all(|n| seen.insert(*n));
        Way {
            id,
            nodes,
            kind: WayKind::Residential,
            max_speed: 25,
            is_one_way,
            is_dead_end: false,
            has_loop,
            num_buildings: 0,
        }
    }

    fn building(id: i64, way_id: i64, snap: Point) -> Building {
        Building {
            id,
            footprint: Polygon::default(),
            levels: None,
            sq_footage: 1000,
            population: 1,
            is_home: true,
            ring: None,
            way_id,
            snap,
        }
    }

    fn model(points: &[(f64, f64)], ways: Vec<Way>, buildings: Vec<Building>) -> Model {
        let nodes = points
            .iter()
            .enumerate()
            .map(|(i, &(lat, lon))| Node {
                osm_id: i as i64 + 1,
                lat,
                lon,
                is_entrance: false,
                ref_count: 1,
            })
            .collect();
        let ways: BTreeMap<i64, Way> = ways.into_iter().map(|w| (w.id, w)).collect();
        let buildings = buildings.into_iter().map(|b| (b.id, b)).collect();
        Model::new(Vec::new(), nodes, ways, buildings).unwrap()
    }

    fn nodes_of(path: &Path) -> Vec<Location> {
        path.locations().collect()
    }

    #[test]
    fn test_three_nodes_on_one_way() {
        let m = model(&[(0.0, 0.0), (0.0, 1.0), (0.0, 2.0)], vec![street(1, vec![0, 1, 2], false)], vec![]);
        let finder = PathFinder::new(&m);

        let path = finder
            .find_best_path(Location::Node(0), Location::Node(2), false, None)
            .unwrap();
        assert_eq!(path.hops(), 2);
        assert_eq!(nodes_of(&path), vec![Location::Node(0), Location::Node(1), Location::Node(2)]);

        let expected = earth_distance(0.0, 0.0, 0.0, 1.0) + earth_distance(0.0, 1.0, 0.0, 2.0);
        assert_almost_eq!(path.cost(), expected);
        assert_almost_eq!(path.segments[1].distance, earth_distance(0.0, 0.0, 0.0, 1.0));

        let by_time = finder
            .find_best_path(Location::Node(0), Location::Node(2), true, None)
            .unwrap();
        assert_almost_eq!(by_time.cost(), expected / 25.0);

        let back = finder
            .find_best_path(Location::Node(2), Location::Node(0), false, None)
            .unwrap();
        assert_eq!(nodes_of(&back), vec![Location::Node(2), Location::Node(1), Location::Node(0)]);
        assert_almost_eq!(back.cost(), expected);
    }

    #[test]
    fn test_one_way_same_way() {
        let m = model(&[(0.0, 0.0), (0.0, 0.01), (0.0, 0.02)], vec![street(1, vec![0, 1, 2], true)], vec![]);
        let finder = PathFinder::new(&m);

        let forward = finder
            .find_best_path(Location::Node(0), Location::Node(2), false, None)
            .unwrap();
        assert_eq!(forward.hops(), 2);
        assert!(forward.cost() < UNREACHABLE);

        let backward = finder
            .find_best_path(Location::Node(2), Location::Node(0), false, None)
            .unwrap();
        assert!(backward.is_empty());
        assert_eq!(backward.cost(), UNREACHABLE);
    }

    #[test]
    fn test_buildings_on_one_segment() {
        let snap1 = Point::new(0.0, 0.002);
        let snap2 = Point::new(0.0, 0.006);
        let points = [(0.0, 0.0), (0.0, 0.01)];
        let buildings = || vec![building(1, 1, snap1), building(2, 1, snap2)];

        let one_way = model(&points, vec![street(1, vec![0, 1], true)], buildings());
        let finder = PathFinder::new(&one_way);

        // Both buildings share the nearest node; the one closer to it comes first
        let path = finder
            .find_best_path(Location::Building(1), Location::Building(2), false, None)
            .unwrap();
        assert_eq!(nodes_of(&path), vec![Location::Building(1), Location::Building(2)]);
        assert_almost_eq!(path.cost(), snap1.distance(&snap2));

        let back = finder
            .find_best_path(Location::Building(2), Location::Building(1), false, None)
            .unwrap();
        assert!(back.is_empty());

        let two_way = model(&points, vec![street(1, vec![0, 1], false)], buildings());
        let back = PathFinder::new(&two_way)
            .find_best_path(Location::Building(2), Location::Building(1), false, None)
            .unwrap();
        assert_almost_eq!(back.cost(), snap1.distance(&snap2));
    }

    #[test]
    fn test_building_to_node_on_same_way() {
        let m = model(
            &[(0.0, 0.0), (0.0, 0.01), (0.0, 0.02), (0.0, 0.03)],
            vec![street(1, vec![0, 1, 2, 3], true)],
            vec![building(1, 1, Point::new(0.0, 0.005))],
        );
        let finder = PathFinder::new(&m);

        let path = finder
            .find_best_path(Location::Building(1), Location::Node(3), false, None)
            .unwrap();
        assert_eq!(
            nodes_of(&path),
            vec![Location::Building(1), Location::Node(1), Location::Node(2), Location::Node(3)]
        );
        assert_almost_eq!(path.cost(), earth_distance(0.0, 0.005, 0.0, 0.03));

        let back = finder
            .find_best_path(Location::Node(3), Location::Building(1), false, None)
            .unwrap();
        assert!(back.is_empty());
    }

    // 0 --- 1 --- 2
    // |           |
    // 3 --------- 4
    fn square(top_one_way: bool) -> Model {
        model(
            &[(0.01, 0.0), (0.01, 0.01), (0.01, 0.02), (0.0, 0.0), (0.0, 0.02)],
            vec![
                street(1, vec![0, 1, 2], top_one_way),
                street(2, vec![2, 4], false),
                street(3, vec![3, 4], false),
                street(4, vec![0, 3], false),
            ],
            vec![
                building(10, 1, Point::new(0.01, 0.005)),
                building(20, 3, Point::new(0.0, 0.017)),
            ],
        )
    }

    #[test]
    fn test_shortest_route() {
        let m = square(false);
        let path = PathFinder::new(&m)
            .find_best_path(Location::Building(10), Location::Building(20), false, None)
            .unwrap();

        // Leaving eastwards is shorter than going around the west side
        assert_eq!(
            nodes_of(&path),
            vec![Location::Building(10), Location::Node(1), Location::Node(2), Location::Node(4), Location::Building(20)]
        );
        assert_eq!(path.segments[1].way_id, Some(1));
        assert_eq!(path.segments[3].way_id, Some(2));
        assert_eq!(path.segments[4].way_id, Some(3));

        for pair in path.segments.windows(2) {
            assert_eq!(pair[1].parent_seg_id, Some(pair[0].seg_id));
            assert!(pair[1].distance > pair[0].distance);
        }
    }

    #[test]
    fn test_one_way_forces_detour() {
        let m = square(true);

        // Building 20 to 10 must go around the west side, as the top street only runs eastwards
        let path = PathFinder::new(&m)
            .find_best_path(Location::Building(20), Location::Building(10), false, None)
            .unwrap();
        assert_eq!(
            nodes_of(&path),
            vec![Location::Building(20), Location::Node(3), Location::Node(0), Location::Building(10)]
        );
    }

    #[test]
    fn test_deterministic() {
        let m = square(false);
        let finder = PathFinder::new(&m);
        let first = finder
            .find_best_path(Location::Node(0), Location::Node(4), true, None)
            .unwrap();
        for _ in 0..5 {
            let again = finder
                .find_best_path(Location::Node(0), Location::Node(4), true, None)
                .unwrap();
            assert_eq!(again, first);
        }
    }

    #[test]
    fn test_loop_way() {
        // 0 --- 1 --> 2
        //       ^     |
        //       |     v
        //       4 <-- 3
        //       1 --> 5
        let m = model(
            &[(0.0, 0.0), (0.0, 0.01), (0.0, 0.02), (-0.01, 0.02), (-0.01, 0.01), (0.0, 0.03)],
            vec![street(1, vec![0, 1], false), street(2, vec![1, 2, 3, 4, 1, 5], true)],
            vec![],
        );
        assert!(m.ways[&2].has_loop);

        let path = PathFinder::new(&m)
            .find_best_path(Location::Node(0), Location::Node(5), false, None)
            .unwrap();
        assert_eq!(nodes_of(&path), vec![Location::Node(0), Location::Node(1), Location::Node(5)]);

        let around = PathFinder::new(&m)
            .find_best_path(Location::Node(0), Location::Node(4), false, None)
            .unwrap();
        assert_eq!(
            nodes_of(&around),
            vec![Location::Node(0), Location::Node(1), Location::Node(2), Location::Node(3), Location::Node(4)]
        );
    }

    #[test]
    fn test_dead_end_carrying_destination() {
        let mut spur = street(3, vec![1, 3], false);
        spur.is_dead_end = true;
        let m = model(
            &[(0.0, 0.0), (0.0, 0.01), (0.0, 0.02), (0.01, 0.01)],
            vec![street(1, vec![0, 1], false), street(2, vec![1, 2], false), spur],
            vec![],
        );

        let path = PathFinder::new(&m)
            .find_best_path(Location::Node(0), Location::Node(3), false, None)
            .unwrap();
        assert_eq!(nodes_of(&path), vec![Location::Node(0), Location::Node(1), Location::Node(3)]);
    }

    #[test]
    fn test_search_limits() {
        // The only connection runs through a node 69 miles away
        let m = model(
            &[(0.0, 0.0), (1.0, 0.05), (0.0, 0.1)],
            vec![street(1, vec![0, 1], false), street(2, vec![1, 2], false)],
            vec![],
        );
        let finder = PathFinder::new(&m);
        let limits = SearchLimits {
            min_dist: 0.1,
            scale: 1.0,
        };

        let unlimited = finder
            .find_best_path(Location::Node(0), Location::Node(2), false, None)
            .unwrap();
        assert_eq!(unlimited.hops(), 2);

        let limited = finder
            .find_best_path(Location::Node(0), Location::Node(2), false, Some(limits))
            .unwrap();
        assert!(limited.is_empty());

        let wide = SearchLimits {
            min_dist: 100.0,
            scale: 1.0,
        };
        let found = finder
            .find_best_path(Location::Node(0), Location::Node(2), false, Some(wide))
            .unwrap();
        assert_eq!(found, unlimited);
    }

    #[test]
    fn test_invalid_endpoints() {
        let m = square(false);
        let finder = PathFinder::new(&m);
        assert_eq!(
            finder.find_best_path(Location::Node(99), Location::Node(0), false, None),
            Err(PathError::InvalidNode(99))
        );
        assert_eq!(
            finder.find_best_path(Location::Node(0), Location::Building(99), false, None),
            Err(PathError::InvalidBuilding(99))
        );

        let same = finder
            .find_best_path(Location::Building(10), Location::Building(10), false, None)
            .unwrap();
        assert_eq!(same.hops(), 0);
        assert_eq!(same.cost(), 0.0);
    }
}
