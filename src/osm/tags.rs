// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Interpretation of OSM tags on streets and buildings.

use std::collections::HashMap;

use log::warn;

use crate::WayKind;

/// Values of the `building` tag which are never turned into [Buildings](crate::Building).
pub const IGNORED_BUILDING_TYPES: &[&str] = &[
    "industrial",
    "terrace",
    "garages",
    "warehouse",
    "shed",
    "roof",
    "construction",
    "manufacture",
];

/// Values of the `building` (or `building:use`) tag which denote homes.
pub const HOME_TYPES: &[&str] = &["yes", "house", "residential", "apartments", "condominium"];

/// Direction in which a street may be traversed, relative to the order of its nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Both,
    Forward,
    Backward,
}

/// Street attributes extracted from way tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Street {
    pub kind: WayKind,
    pub max_speed: u32,
    pub direction: Direction,
}

/// Building attributes extracted from way tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingTags {
    pub building_type: String,
    pub is_amenity: bool,
    pub levels: Option<u32>,
}

impl BuildingTags {
    #[inline]
    pub fn is_ignored(&self) -> bool {
        IGNORED_BUILDING_TYPES.contains(&self.building_type.as_str())
    }

    #[inline]
    pub fn is_home(&self) -> bool {
        !self.is_amenity && HOME_TYPES.contains(&self.building_type.as_str())
    }
}

/// Speed limit (in mph) assumed for a `highway` value when no `maxspeed` tag is present.
/// Returns zero for values which are not drivable.
pub fn default_speed(highway: &str) -> u32 {
    match highway {
        "service" | "residential" | "tertiary" | "secondary_link" | "tertiary_link" => 25,
        "primary" | "secondary" => 35,
        "motorway_link" | "primary_link" | "trunk_link" => 45,
        "motorway" => 65,
        "trunk" => 55,
        _ => 0,
    }
}

/// Parses the leading integer of a `maxspeed` value, e.g. `"30 mph"`.
pub fn parse_max_speed(value: &str) -> Option<u32> {
    let value = value.trim_start();
    let digits = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    value[..digits].parse().ok()
}

/// Parses the value of a `oneway` tag.
pub fn parse_one_way(value: &str) -> Option<Direction> {
    match value {
        "yes" | "1" | "true" | "reversible" => Some(Direction::Forward),
        "-1" | "reverse" => Some(Direction::Backward),
        "no" | "0" | "false" => Some(Direction::Both),
        _ => None,
    }
}

/// Checks whether a way may be a street at all. Buildings and amenities are never streets.
pub fn is_street_candidate(tags: &HashMap<String, String>) -> bool {
    !tags.contains_key("building") && !tags.contains_key("amenity") && !tags.contains_key("building:use")
}

/// Interprets tags of a way as a street. Returns [None] for ways which are not
/// drivable streets: non-highways, unknown highway kinds and ways without a speed.
pub fn street(way_id: i64, tags: &HashMap<String, String>) -> Option<Street> {
    if !is_street_candidate(tags) {
        return None;
    }

    let highway = tags.get("highway")?;
    let kind = WayKind::from_highway(highway);
    if kind == WayKind::Unknown {
        return None;
    }

    let max_speed = match tags.get("maxspeed") {
        Some(v) => parse_max_speed(v).unwrap_or_else(|| {
            warn!("way {}: invalid maxspeed {:?}", way_id, v);
            default_speed(highway)
        }),
        None => default_speed(highway),
    };
    if max_speed == 0 {
        return None;
    }

    let direction = match tags.get("oneway") {
        Some(v) => parse_one_way(v).unwrap_or_else(|| {
            warn!("way {}: unrecognized oneway value {:?}", way_id, v);
            Direction::Both
        }),
        None => Direction::Both,
    };

    Some(Street {
        kind,
        max_speed,
        direction,
    })
}

/// Interprets tags of a way as a building. Returns [None] if the way has no `building` tag.
pub fn building(way_id: i64, tags: &HashMap<String, String>) -> Option<BuildingTags> {
    let building_type = tags.get("building")?.clone();

    let mut is_amenity = tags.contains_key("amenity");
    if let Some(usage) = tags.get("building:use") {
        if !HOME_TYPES.contains(&usage.as_str()) {
            is_amenity = true;
        }
    }

    let levels = match tags.get("building:levels") {
        Some(v) => match v.trim().parse::<u32>() {
            Ok(levels) if levels > 0 => Some(levels),
            _ => {
                warn!("building {}: invalid building:levels {:?}", way_id, v);
                None
            }
        },
        None => None,
    };

    Some(BuildingTags {
        building_type,
        is_amenity,
        levels,
    })
}
