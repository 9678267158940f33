// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::str::FromStr;

use super::{Error, Model};
use crate::{Building, Node, Point, Polygon, PopulationRing, RingStats, Way, WayKind};

pub const FORMAT_VERSION: u32 = 1;

const RING_HEADER: &str =
    "# rng idx ringID shapeID pop numVertices tlLat tlLon brLat brLon numBld bldSqFt homes homeSqFt \"info\"";
const NODE_HEADER: &str = "# node osmId lat lon isEntrance refCount";
const WAY_HEADER: &str = "# way id kind maxSpeed isDeadEnd isOneWay hasLoop numBuildings node...";
const BUILDING_HEADER: &str =
    "# bld id levels population ring isHome sqFootage wayID wayLat wayLon numVertices lat lon ...";

pub(super) fn write<W: Write>(m: &Model, mut w: W) -> Result<(), Error> {
    writeln!(w, "# popgraph model v{}", FORMAT_VERSION)?;
    writeln!(
        w,
        "# {} rings, {} nodes, {} ways, {} buildings",
        m.rings.len(),
        m.nodes.len(),
        m.ways.len(),
        m.buildings.len()
    )?;

    writeln!(w, "{}", RING_HEADER)?;
    for (idx, r) in m.rings.iter().enumerate() {
        write_ring(&mut w, idx, r)?;
    }

    writeln!(w, "{}", NODE_HEADER)?;
    for n in &m.nodes {
        writeln!(
            w,
            "node {} {} {} {} {}",
            n.osm_id, n.lat, n.lon, n.is_entrance, n.ref_count
        )?;
    }

    writeln!(w, "{}", WAY_HEADER)?;
    for way in m.ways.values() {
        write!(
            w,
            "way {} {} {} {} {} {} {}",
            way.id,
            way.kind.code(),
            way.max_speed,
            way.is_dead_end,
            way.is_one_way,
            way.has_loop,
            way.num_buildings,
        )?;
        for n in &way.nodes {
            write!(w, " {}", n)?;
        }
        writeln!(w)?;
    }

    writeln!(w, "{}", BUILDING_HEADER)?;
    for b in m.buildings.values() {
        write!(
            w,
            "bld {} {} {} {} {} {} {} {} {} {}",
            b.id,
            b.levels.map_or(-1, i64::from),
            b.population,
            b.ring.map_or(-1, |r| r as i64),
            b.is_home,
            b.sq_footage,
            b.way_id,
            b.snap.lat,
            b.snap.lon,
            b.footprint.len(),
        )?;
        for v in b.footprint.vertices() {
            write!(w, " {} {}", v.lat, v.lon)?;
        }
        writeln!(w)?;
    }

    Ok(())
}

fn write_ring<W: Write>(w: &mut W, idx: usize, r: &PopulationRing) -> Result<(), Error> {
    let b = r.polygon.bounds().unwrap_or(crate::Bounds {
        min: Point::default(),
        max: Point::default(),
    });
    writeln!(
        w,
        "rng {} {} {} {} {} {} {} {} {} {} {} {} {} \"{}\"",
        idx,
        r.ring_id,
        r.shape_id,
        r.population,
        r.polygon.len(),
        b.max.lat,
        b.min.lon,
        b.min.lat,
        b.max.lon,
        r.stats.buildings,
        r.stats.building_sq_ft,
        r.stats.homes,
        r.stats.home_sq_ft,
        r.info.replace(['\n', '\r'], " "),
    )?;
    Ok(())
}

pub(super) fn read<R: BufRead>(reader: R) -> Result<Model, Error> {
    let mut rings = Vec::new();
    let mut nodes = Vec::new();
    let mut ways = BTreeMap::new();
    let mut buildings = BTreeMap::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let mut f = Fields::new(&line, i + 1);

        match f.tag() {
            None => {}
            Some("rng") => rings.push(parse_ring(&mut f, rings.len())?),
            Some("node") => nodes.push(parse_node(&mut f)?),
            Some("way") => {
                let way = parse_way(&mut f)?;
                if ways.insert(way.id, way).is_some() {
                    return Err(f.error("duplicate way id".to_string()));
                }
            }
            Some("bld") => {
                let b = parse_building(&mut f)?;
                if buildings.insert(b.id, b).is_some() {
                    return Err(f.error("duplicate building id".to_string()));
                }
            }
            Some(other) => return Err(f.error(format!("unknown record type {:?}", other))),
        }
    }

    Model::new(rings, nodes, ways, buildings)
}

/// Reads population rings from a file of `rng` records, as produced by the
/// ring generator. Other model records are skipped, so a whole model file
/// can serve as the ring source too.
pub fn read_rings<R: BufRead>(reader: R) -> Result<Vec<PopulationRing>, Error> {
    let mut rings = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let mut f = Fields::new(&line, i + 1);
        match f.tag() {
            Some("rng") => rings.push(parse_ring(&mut f, rings.len())?),
            None | Some("node") | Some("way") | Some("bld") => {}
            Some(other) => return Err(f.error(format!("unknown record type {:?}", other))),
        }
    }

    Ok(rings)
}

pub fn read_rings_from_file<P: AsRef<Path>>(path: P) -> Result<Vec<PopulationRing>, Error> {
    let f = File::open(path)?;
    read_rings(io::BufReader::new(f))
}

fn parse_ring(f: &mut Fields, expected_idx: usize) -> Result<PopulationRing, Error> {
    let idx: usize = f.next("idx")?;
    if idx != expected_idx {
        return Err(f.error(format!("ring index {} out of order, expected {}", idx, expected_idx)));
    }

    let ring_id = f.next("ringID")?;
    let shape_id = f.next("shapeID")?;
    let population = f.next("pop")?;
    let _num_vertices: usize = f.next("numVertices")?;
    let top_left = Point::new(f.next("tlLat")?, f.next("tlLon")?);
    let bottom_right = Point::new(f.next("brLat")?, f.next("brLon")?);
    let stats = RingStats {
        buildings: f.next("numBld")?,
        building_sq_ft: f.next("bldSqFt")?,
        homes: f.next("homes")?,
        home_sq_ft: f.next("homeSqFt")?,
    };
    let info = unquote(f.rest()).to_string();

    let mut ring = PopulationRing::rectangle(ring_id, shape_id, population, top_left, bottom_right, info);
    ring.stats = stats;
    Ok(ring)
}

/// Strips exactly one pair of surrounding quotes, keeping quotes inside the value.
fn unquote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn parse_node(f: &mut Fields) -> Result<Node, Error> {
    let n = Node {
        osm_id: f.next("osmId")?,
        lat: f.next("lat")?,
        lon: f.next("lon")?,
        is_entrance: f.next_bool("isEntrance")?,
        ref_count: f.next("refCount")?,
    };
    f.finish()?;
    Ok(n)
}

fn parse_way(f: &mut Fields) -> Result<Way, Error> {
    let id = f.next("id")?;
    let code: u8 = f.next("kind")?;
    let kind = WayKind::from_code(code).ok_or_else(|| f.error(format!("invalid way kind {}", code)))?;
    let max_speed = f.next("maxSpeed")?;
    let is_dead_end = f.next_bool("isDeadEnd")?;
    let is_one_way = f.next_bool("isOneWay")?;
    let has_loop = f.next_bool("hasLoop")?;
    let num_buildings = f.next("numBuildings")?;

    let mut nodes = Vec::new();
    while !f.is_empty() {
        nodes.push(f.next("node")?);
    }

    Ok(Way {
        id,
        nodes,
        kind,
        max_speed,
        is_one_way,
        is_dead_end,
        has_loop,
        num_buildings,
    })
}

fn parse_building(f: &mut Fields) -> Result<Building, Error> {
    let id = f.next("id")?;
    let levels: i64 = f.next("levels")?;
    let population = f.next("population")?;
    let ring: i64 = f.next("ring")?;
    let is_home = f.next_bool("isHome")?;
    let sq_footage = f.next("sqFootage")?;
    let way_id = f.next("wayID")?;
    let snap = Point::new(f.next("wayLat")?, f.next("wayLon")?);

    let num_vertices: usize = f.next("numVertices")?;
    let mut vertices = Vec::with_capacity(num_vertices);
    for _ in 0..num_vertices {
        vertices.push(Point::new(f.next("lat")?, f.next("lon")?));
    }
    f.finish()?;

    Ok(Building {
        id,
        footprint: Polygon::new(vertices),
        levels: u32::try_from(levels).ok().filter(|&l| l > 0),
        sq_footage,
        population,
        is_home,
        ring: usize::try_from(ring).ok(),
        way_id,
        snap,
    })
}

/// Whitespace-separated fields of a single model file line.
struct Fields<'a> {
    line: usize,
    rest: &'a str,
}

impl<'a> Fields<'a> {
    fn new(text: &'a str, line: usize) -> Self {
        Self { line, rest: text }
    }

    /// Returns the record tag, or [None] for blank and comment lines.
    fn tag(&mut self) -> Option<&'a str> {
        if self.rest.trim_start().starts_with('#') {
            return None;
        }
        self.word()
    }

    fn word(&mut self) -> Option<&'a str> {
        let trimmed = self.rest.trim_start();
        if trimmed.is_empty() {
            self.rest = trimmed;
            return None;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        let (word, rest) = trimmed.split_at(end);
        self.rest = rest;
        Some(word)
    }

    fn next<T: FromStr>(&mut self, name: &str) -> Result<T, Error> {
        let word = self
            .word()
            .ok_or_else(|| self.error(format!("missing field {}", name)))?;
        word.parse()
            .map_err(|_| self.error(format!("invalid {}: {:?}", name, word)))
    }

    fn next_bool(&mut self, name: &str) -> Result<bool, Error> {
        match self.word() {
            Some("true") | Some("1") => Ok(true),
            Some("false") | Some("0") => Ok(false),
            Some(other) => Err(self.error(format!("invalid {}: {:?}", name, other))),
            None => Err(self.error(format!("missing field {}", name))),
        }
    }

    fn rest(&mut self) -> &'a str {
        let rest = self.rest.trim();
        self.rest = "";
        rest
    }

    fn is_empty(&self) -> bool {
        self.rest.trim().is_empty()
    }

    fn finish(&mut self) -> Result<(), Error> {
        match self.word() {
            None => Ok(()),
            Some(extra) => Err(self.error(format!("unexpected trailing field {:?}", extra))),
        }
    }

    fn error(&self, reason: String) -> Error {
        Error::Format {
            line: self.line,
            reason,
        }
    }
}
