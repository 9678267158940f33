// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

/// Road class of a [Way], derived from the OSM `highway` tag.
///
/// The discriminants are stable and used by the model file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WayKind {
    Service = 0,
    Residential = 1,
    Primary = 2,
    Secondary = 3,
    Tertiary = 4,
    Motorway = 5,
    MotorwayLink = 6,
    Trunk = 7,
    PrimaryLink = 8,
    TrunkLink = 9,
    SecondaryLink = 10,
    TertiaryLink = 11,
    Unknown = 12,
}

impl WayKind {
    const ALL: [WayKind; 13] = [
        Self::Service,
        Self::Residential,
        Self::Primary,
        Self::Secondary,
        Self::Tertiary,
        Self::Motorway,
        Self::MotorwayLink,
        Self::Trunk,
        Self::PrimaryLink,
        Self::TrunkLink,
        Self::SecondaryLink,
        Self::TertiaryLink,
        Self::Unknown,
    ];

    /// Maps a value of the OSM `highway` tag onto a road class.
    pub fn from_highway(value: &str) -> Self {
        match value {
            "service" => Self::Service,
            "residential" => Self::Residential,
            "primary" => Self::Primary,
            "secondary" => Self::Secondary,
            "tertiary" => Self::Tertiary,
            "motorway" => Self::Motorway,
            "motorway_link" => Self::MotorwayLink,
            "trunk" => Self::Trunk,
            "primary_link" => Self::PrimaryLink,
            "trunk_link" => Self::TrunkLink,
            "secondary_link" => Self::SecondaryLink,
            "tertiary_link" => Self::TertiaryLink,
            _ => Self::Unknown,
        }
    }

    /// Numeric code used in the model file.
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Inverse of [WayKind::code].
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }
}

/// A routable street: an ordered chain of [nodes](crate::Node).
///
/// During ingestion `nodes` hold OSM node ids; in a [Model](crate::Model)
/// they are indices into the model's node table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Way {
    pub id: i64,
    pub nodes: Vec<i64>,
    pub kind: WayKind,

    /// Speed limit in miles per hour, always positive.
    pub max_speed: u32,

    /// Traversal is only allowed in the order of `nodes`.
    pub is_one_way: bool,

    /// Fewer than two nodes of this way are shared with other ways.
    pub is_dead_end: bool,

    /// Some node appears more than once in `nodes`.
    pub has_loop: bool,

    /// Number of buildings snapped to this way.
    pub num_buildings: u32,
}

impl Way {
    /// Returns every position of `node` in [Way::nodes].
    ///
    /// Only looping ways can have more than one position for a node.
    pub fn positions_of(&self, node: i64) -> Vec<usize> {
        if self.has_loop {
            self.nodes
                .iter()
                .enumerate()
                .filter_map(|(i, &n)| if n == node { Some(i) } else { None })
                .collect()
        } else {
            self.nodes.iter().position(|&n| n == node).into_iter().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        for kind in WayKind::ALL {
            assert_eq!(WayKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(WayKind::Unknown.code(), 12);
        assert_eq!(WayKind::from_code(13), None);
    }

    #[test]
    fn test_from_highway() {
        assert_eq!(WayKind::from_highway("residential"), WayKind::Residential);
        assert_eq!(WayKind::from_highway("trunk_link"), WayKind::TrunkLink);
        assert_eq!(WayKind::from_highway("footway"), WayKind::Unknown);
        assert_eq!(WayKind::from_highway("unclassified"), WayKind::Unknown);
    }

    #[test]
    fn test_positions_of() {
        let mut w = Way {
            id: 1,
            nodes: vec![10, 11, 12, 13, 11, 14],
            kind: WayKind::Residential,
            max_speed: 25,
            is_one_way: false,
            is_dead_end: false,
            has_loop: true,
            num_buildings: 0,
        };
        assert_eq!(w.positions_of(11), vec![1, 4]);
        assert_eq!(w.positions_of(14), vec![5]);
        assert!(w.positions_of(99).is_empty());

        w.has_loop = false;
        assert_eq!(w.positions_of(11), vec![1]);
    }
}
