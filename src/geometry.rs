// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::distance::{earth_distance, miles_to_lat, miles_to_lon, MILES_PER_LAT};

/// Square feet in a square mile.
pub const SQ_FEET_PER_SQ_MILE: f64 = 27_878_400.0;

/// A position on Earth, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another point, in miles.
    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        earth_distance(self.lat, self.lon, other.lat, other.lon)
    }

    /// Moves the point by the provided amount of miles northwards and eastwards.
    pub fn offset(&self, north: f64, east: f64) -> Point {
        Point {
            lat: self.lat + miles_to_lat(north),
            lon: self.lon + miles_to_lon(east, self.lat),
        }
    }
}

/// Projects `p` onto the segment `a`-`b`, treating latitude and longitude as plane
/// coordinates. Returns [None] if the foot of the perpendicular falls outside
/// of the segment, or if the segment is degenerate.
pub fn project_onto_segment(p: Point, a: Point, b: Point) -> Option<Point> {
    let d_lat = b.lat - a.lat;
    let d_lon = b.lon - a.lon;
    let len2 = d_lat * d_lat + d_lon * d_lon;
    if len2 == 0.0 {
        return None;
    }

    let t = ((p.lat - a.lat) * d_lat + (p.lon - a.lon) * d_lon) / len2;
    if (0.0..=1.0).contains(&t) {
        Some(Point::new(a.lat + t * d_lat, a.lon + t * d_lon))
    } else {
        None
    }
}

/// Finds the point on segment `a`-`b` closest to `p`: the perpendicular projection
/// if it lies on the segment, the nearer endpoint otherwise.
/// Returns the point and its distance from `p` in miles.
pub fn snap_to_segment(p: Point, a: Point, b: Point) -> (Point, f64) {
    if let Some(projected) = project_onto_segment(p, a, b) {
        return (projected, p.distance(&projected));
    }

    let to_a = p.distance(&a);
    let to_b = p.distance(&b);
    if to_a <= to_b {
        (a, to_a)
    } else {
        (b, to_b)
    }
}

/// Returns the point `dist` miles from `from` in the direction of `to`.
pub fn point_along(from: Point, to: Point, dist: f64) -> Point {
    let total = from.distance(&to);
    if total == 0.0 {
        return from;
    }

    let fraction = dist / total;
    Point::new(
        from.lat + (to.lat - from.lat) * fraction,
        from.lon + (to.lon - from.lon) * fraction,
    )
}

/// Axis-aligned lat-lon rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Smallest rectangle containing both points.
    pub fn around(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.lat.min(b.lat), a.lon.min(b.lon)),
            max: Point::new(a.lat.max(b.lat), a.lon.max(b.lon)),
        }
    }

    /// Grows the rectangle by `miles` in every direction.
    pub fn expand(&self, miles: f64) -> Self {
        let d_lat = miles_to_lat(miles);
        let widest_lat = self.min.lat.abs().max(self.max.lat.abs());
        let d_lon = miles_to_lon(miles, widest_lat);
        Self {
            min: Point::new(self.min.lat - d_lat, self.min.lon - d_lon),
            max: Point::new(self.max.lat + d_lat, self.max.lon + d_lon),
        }
    }

    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        p.lat >= self.min.lat && p.lat <= self.max.lat && p.lon >= self.min.lon && p.lon <= self.max.lon
    }
}

/// A closed ring of lat-lon vertices. The last vertex may repeat the first one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polygon {
    vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    /// Creates a closed rectangle spanning the two provided corners.
    pub fn rectangle(top_left: Point, bottom_right: Point) -> Self {
        Self::new(vec![
            top_left,
            Point::new(top_left.lat, bottom_right.lon),
            bottom_right,
            Point::new(bottom_right.lat, top_left.lon),
            top_left,
        ])
    }

    #[inline]
    pub fn vertices(&self) -> &[Point] {
        &self.vertices
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterates over all edges of the polygon, including the closing one.
    fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    /// Checks whether the point lies inside the polygon, using the even-odd rule.
    pub fn contains(&self, p: Point) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.lat > p.lat) != (b.lat > p.lat) {
                let crossing_lon = (b.lon - a.lon) * (p.lat - a.lat) / (b.lat - a.lat) + a.lon;
                if p.lon < crossing_lon {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Checks whether the point lies within `max_dist` miles of any edge of the polygon.
    pub fn is_near(&self, p: Point, max_dist: f64) -> bool {
        self.edges().any(|(a, b)| snap_to_segment(p, a, b).1 <= max_dist)
    }

    /// Area of the polygon in square miles.
    pub fn area(&self) -> f64 {
        let Some(origin) = self.vertices.first() else {
            return 0.0;
        };

        // Local plane around the first vertex
        let lon_scale = MILES_PER_LAT * origin.lat.to_radians().cos();
        let to_plane = |v: &Point| {
            (
                (v.lon - origin.lon) * lon_scale,
                (v.lat - origin.lat) * MILES_PER_LAT,
            )
        };

        let mut twice_area = 0.0;
        for (a, b) in self.edges() {
            let (x1, y1) = to_plane(&a);
            let (x2, y2) = to_plane(&b);
            twice_area += x1 * y2 - x2 * y1;
        }
        (twice_area * 0.5).abs()
    }

    /// Area-weighted center of the polygon. Falls back to the mean of vertices for
    /// degenerate polygons, and returns [None] for empty ones.
    pub fn centroid(&self) -> Option<Point> {
        let origin = *self.vertices.first()?;

        let mut twice_area = 0.0;
        let mut c_lat = 0.0;
        let mut c_lon = 0.0;
        for (a, b) in self.edges() {
            let (x1, y1) = (a.lon - origin.lon, a.lat - origin.lat);
            let (x2, y2) = (b.lon - origin.lon, b.lat - origin.lat);
            let cross = x1 * y2 - x2 * y1;
            twice_area += cross;
            c_lon += (x1 + x2) * cross;
            c_lat += (y1 + y2) * cross;
        }

        if twice_area.abs() < 1e-18 {
            let n = self.vertices.len() as f64;
            let lat = self.vertices.iter().map(|v| v.lat).sum::<f64>() / n;
            let lon = self.vertices.iter().map(|v| v.lon).sum::<f64>() / n;
            return Some(Point::new(lat, lon));
        }

        let scale = 1.0 / (3.0 * twice_area);
        Some(Point::new(origin.lat + c_lat * scale, origin.lon + c_lon * scale))
    }

    /// Bounding box of all vertices, or [None] for empty polygons.
    pub fn bounds(&self) -> Option<Bounds> {
        let first = *self.vertices.first()?;
        let mut b = Bounds {
            min: first,
            max: first,
        };
        for v in &self.vertices[1..] {
            b.min.lat = b.min.lat.min(v.lat);
            b.min.lon = b.min.lon.min(v.lon);
            b.max.lat = b.max.lat.max(v.lat);
            b.max.lon = b.max.lon.max(v.lon);
        }
        Some(b)
    }
}
