// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

use crate::distance::MILES_PER_LAT;
use crate::geometry::{point_along, Point, Polygon};

const FEET_PER_MILE: f64 = 5280.0;

/// Location of a synthetic home along a street.
#[derive(Debug, Clone, PartialEq)]
pub struct HomeSite {
    /// Point on the street the home is attached to.
    pub snap: Point,
    pub footprint: Polygon,
}

/// Parameters of synthetic home placement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HomeLayout {
    /// Distance between consecutive stops along the street, in miles.
    pub spacing: f64,

    /// Footprint of every home, in square feet.
    pub sq_footage: i64,

    /// Distance between the street and the front of a home, in miles.
    pub setback: f64,
}

/// Walks along a street polyline and places a pair of square homes,
/// one on each side of the street, every [HomeLayout::spacing] miles.
/// The first pair is placed half the spacing from the start.
pub fn homes_along(street: &[Point], layout: &HomeLayout) -> Vec<HomeSite> {
    let mut sites = Vec::new();
    if layout.spacing <= 0.0 {
        return sites;
    }

    let side = (layout.sq_footage.max(0) as f64).sqrt() / FEET_PER_MILE;
    let mut offset = layout.spacing / 2.0;

    for pair in street.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let length = a.distance(&b);
        let Some(along) = unit_direction(a, b) else {
            continue;
        };
        let across = (along.1, -along.0);

        while offset <= length {
            let stop = point_along(a, b, offset);
            for sign in [1.0, -1.0] {
                let normal = (across.0 * sign, across.1 * sign);
                sites.push(HomeSite {
                    snap: stop,
                    footprint: square_footprint(stop, along, normal, layout.setback, side),
                });
            }
            offset += layout.spacing;
        }

        offset -= length;
    }

    sites
}

/// Unit vector (north, east) in miles pointing from `a` to `b`.
fn unit_direction(a: Point, b: Point) -> Option<(f64, f64)> {
    let north = (b.lat - a.lat) * MILES_PER_LAT;
    let east = (b.lon - a.lon) * MILES_PER_LAT * a.lat.to_radians().cos();
    let norm = north.hypot(east);
    if norm == 0.0 {
        None
    } else {
        Some((north / norm, east / norm))
    }
}

fn square_footprint(
    stop: Point,
    along: (f64, f64),
    normal: (f64, f64),
    setback: f64,
    side: f64,
) -> Polygon {
    let corner = |forward: f64, out: f64| {
        stop.offset(
            along.0 * forward + normal.0 * out,
            along.1 * forward + normal.1 * out,
        )
    };

    let half = side / 2.0;
    let near_left = corner(-half, setback);
    Polygon::new(vec![
        near_left,
        corner(half, setback),
        corner(half, setback + side),
        corner(-half, setback + side),
        near_left,
    ])
}
