// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! [GeoJSON](https://geojson.org/) export of routes and population rings, for inspection in any GIS viewer.

use std::io::{self, Write};

use crate::{Location, Model, Path, Point};

/// Writes the route as a FeatureCollection with a single LineString.
pub fn write_path<W: Write>(w: &mut W, model: &Model, path: &Path) -> io::Result<()> {
    let points: Vec<Point> = path
        .locations()
        .filter_map(|l| location_point(model, l))
        .collect();

    writeln!(w, "{{")?;
    writeln!(w, "  \"type\": \"FeatureCollection\",")?;
    writeln!(w, "  \"features\": [")?;
    writeln!(w, "    {{")?;
    writeln!(w, "      \"type\": \"Feature\",")?;
    writeln!(
        w,
        "      \"properties\": {{\"cost\": {}, \"hops\": {}}},",
        path.cost(),
        path.hops()
    )?;
    writeln!(w, "      \"geometry\": {{")?;
    writeln!(w, "        \"type\": \"LineString\",")?;
    writeln!(w, "        \"coordinates\": [")?;
    write_coordinates(w, &points, "          ")?;
    writeln!(w, "        ]")?;
    writeln!(w, "      }}")?;
    writeln!(w, "    }}")?;
    writeln!(w, "  ]")?;
    writeln!(w, "}}")?;
    Ok(())
}

/// Writes the outline of a ring, every street passing through it and every
/// building assigned to it. Returns [io::ErrorKind::NotFound] for unknown rings.
pub fn write_ring<W: Write>(w: &mut W, model: &Model, ring_idx: usize) -> io::Result<()> {
    let ring = model.rings.get(ring_idx).ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, format!("no population ring #{}", ring_idx))
    })?;

    let mut features: Vec<String> = Vec::new();

    features.push(feature(
        &format!(
            "{{\"ring\": {}, \"ringID\": {}, \"population\": {}}}",
            ring_idx, ring.ring_id, ring.population
        ),
        "Polygon",
        &format!("[{}]", coordinates(ring.polygon.vertices())),
    ));

    for way in model.ways.values() {
        let points = model.way_points(way);
        if points.iter().any(|&p| ring.contains_or_near(p)) {
            features.push(feature(
                &format!(
                    "{{\"way\": {}, \"oneWay\": {}, \"deadEnd\": {}}}",
                    way.id, way.is_one_way, way.is_dead_end
                ),
                "LineString",
                &coordinates(&points),
            ));
        }
    }

    for b in model.buildings.values().filter(|b| b.ring == Some(ring_idx)) {
        let properties = format!(
            "{{\"building\": {}, \"home\": {}, \"population\": {}, \"way\": {}}}",
            b.id, b.is_home, b.population, b.way_id
        );
        if b.footprint.is_empty() {
            features.push(feature(&properties, "Point", &coordinate(b.snap)));
        } else {
            features.push(feature(
                &properties,
                "Polygon",
                &format!("[{}]", coordinates(b.footprint.vertices())),
            ));
        }
    }

    writeln!(w, "{{")?;
    writeln!(w, "  \"type\": \"FeatureCollection\",")?;
    writeln!(w, "  \"features\": [")?;
    let mut it = features.iter().peekable();
    while let Some(f) = it.next() {
        let suffix = if it.peek().is_some() { "," } else { "" };
        writeln!(w, "    {}{}", f, suffix)?;
    }
    writeln!(w, "  ]")?;
    writeln!(w, "}}")?;
    Ok(())
}

fn location_point(model: &Model, location: Location) -> Option<Point> {
    match location {
        Location::Node(idx) => model.node(idx).map(|n| n.position()),
        Location::Building(id) => model.building(id).map(|b| b.snap),
    }
}

fn write_coordinates<W: Write>(w: &mut W, points: &[Point], indent: &str) -> io::Result<()> {
    let mut it = points.iter().peekable();
    while let Some(p) = it.next() {
        let suffix = if it.peek().is_some() { "," } else { "" };
        writeln!(w, "{}[{}, {}]{}", indent, p.lon, p.lat, suffix)?;
    }
    Ok(())
}

fn feature(properties: &str, kind: &str, coordinates: &str) -> String {
    format!(
        "{{\"type\": \"Feature\", \"properties\": {}, \"geometry\": {{\"type\": \"{}\", \"coordinates\": {}}}}}",
        properties, kind, coordinates
    )
}

#[inline]
fn coordinate(p: Point) -> String {
    format!("[{}, {}]", p.lon, p.lat)
}

fn coordinates(points: &[Point]) -> String {
    let inner: Vec<String> = points.iter().map(|&p| coordinate(p)).collect();
    format!("[{}]", inner.join(", "))
}
