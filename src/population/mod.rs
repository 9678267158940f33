// (c) Copyright 2025 Mikołaj Kuranowski
// SPDX-License-Identifier: MIT

//! Distribution of ring populations over home buildings.

use std::collections::BTreeMap;

use log::{info, warn};

use crate::{Building, PopulationRing};

mod adjustments;
mod homes;

pub use adjustments::{Adjustments, Remap};
pub use homes::{homes_along, HomeLayout, HomeSite};

/// Outcome of distributing the population of a single ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Distribution {
    pub ring: usize,
    pub target: i64,
    pub assigned: i64,
}

impl Distribution {
    /// Difference between assigned and target population, as a percentage of the target.
    pub fn error_percent(&self) -> f64 {
        if self.target == 0 {
            0.0
        } else {
            (self.assigned - self.target) as f64 * 100.0 / self.target as f64
        }
    }
}

/// Assigns population to home buildings, proportionally to their floor area.
///
/// For each ring with a positive target population, the floor area of all its homes
/// is divided by the target to get the floor area per person; every home then
/// receives enough people to fill its floor area (rounding up), until the
/// ring's target is exhausted. Homes are filled in the order of their ids.
pub fn distribute(
    rings: &[PopulationRing],
    buildings: &mut BTreeMap<i64, Building>,
) -> Vec<Distribution> {
    let mut homes_by_ring: Vec<Vec<i64>> = vec![Vec::new(); rings.len()];
    for b in buildings.values_mut() {
        b.population = 0;
        if let Some(ring) = b.ring.filter(|_| b.is_home) {
            if let Some(homes) = homes_by_ring.get_mut(ring) {
                homes.push(b.id);
            }
        }
    }

    let mut outcomes = Vec::new();
    for (idx, (ring, homes)) in rings.iter().zip(homes_by_ring).enumerate() {
        if ring.population < 1 {
            continue;
        }

        let home_sq_ft: i64 = homes
            .iter()
            .filter_map(|id| buildings.get(id))
            .map(|b| b.floor_area())
            .sum();

        if home_sq_ft <= 0 {
            warn!(
                "Ring {} has no homes for its population of {}",
                idx, ring.population
            );
            outcomes.push(Distribution {
                ring: idx,
                target: ring.population,
                assigned: 0,
            });
            continue;
        }

        let sq_ft_per_person = (home_sq_ft / ring.population).max(1);
        let mut remaining = ring.population;
        for id in &homes {
            let Some(b) = buildings.get_mut(id) else {
                continue;
            };
            let wanted = (b.floor_area() + sq_ft_per_person - 1) / sq_ft_per_person;
            b.population = wanted.min(remaining);
            remaining -= b.population;
        }

        let outcome = Distribution {
            ring: idx,
            target: ring.population,
            assigned: ring.population - remaining,
        };
        info!(
            "Ring {}: assigned {} of {} people over {} homes ({:+.2}%)",
            idx,
            outcome.assigned,
            outcome.target,
            homes.len(),
            outcome.error_percent(),
        );
        outcomes.push(outcome);
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Point, Polygon};

    fn ring(population: i64) -> PopulationRing {
        PopulationRing::rectangle(
            0,
            0,
            population,
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
            String::new(),
        )
    }

    fn building(id: i64, sq_footage: i64, levels: Option<u32>, is_home: bool, ring: usize) -> Building {
        Building {
            id,
            footprint: Polygon::default(),
            levels,
            sq_footage,
            population: 0,
            is_home,
            ring: Some(ring),
            way_id: 1,
            snap: Point::default(),
        }
    }

    fn table(buildings: Vec<Building>) -> BTreeMap<i64, Building> {
        buildings.into_iter().map(|b| (b.id, b)).collect()
    }

    #[test]
    fn test_distribute_proportionally() {
        let rings = vec![ring(10)];
        let mut buildings = table(vec![
            building(1, 1000, None, true, 0),
            building(2, 1000, Some(3), true, 0),
            building(3, 5000, None, false, 0),
            building(4, 1000, None, true, 0),
        ]);

        let outcomes = distribute(&rings, &mut buildings);
        assert_eq!(
            outcomes,
            vec![Distribution {
                ring: 0,
                target: 10,
                assigned: 10,
            }]
        );

        // 5000 sq ft of homes, 500 sq ft per person
        assert_eq!(buildings[&1].population, 2);
        assert_eq!(buildings[&2].population, 6);
        assert_eq!(buildings[&3].population, 0);
        assert_eq!(buildings[&4].population, 2);
    }

    #[test]
    fn test_distribute_never_exceeds_target() {
        let rings = vec![ring(7), ring(3)];
        let mut buildings = table(vec![
            building(1, 999, None, true, 0),
            building(2, 1001, None, true, 0),
            building(3, 333, None, true, 0),
            building(4, 100, None, true, 1),
            building(5, 100, None, true, 1),
        ]);

        let outcomes = distribute(&rings, &mut buildings);
        for outcome in &outcomes {
            assert_eq!(outcome.assigned, outcome.target);
            let total: i64 = buildings
                .values()
                .filter(|b| b.ring == Some(outcome.ring))
                .map(|b| b.population)
                .sum();
            assert_eq!(total, outcome.target);
        }
    }

    #[test]
    fn test_distribute_more_people_than_floor_area() {
        let rings = vec![ring(50)];
        let mut buildings = table(vec![building(1, 10, None, true, 0), building(2, 10, None, true, 0)]);

        let outcomes = distribute(&rings, &mut buildings);
        assert_eq!(outcomes[0].assigned, 20);
        assert_eq!(buildings[&1].population, 10);
        assert_eq!(buildings[&2].population, 10);
        assert!(outcomes[0].error_percent() < 0.0);
    }

    #[test]
    fn test_distribute_without_homes() {
        let rings = vec![ring(5), ring(0)];
        let mut buildings = table(vec![building(1, 1000, None, false, 0)]);

        let outcomes = distribute(&rings, &mut buildings);
        assert_eq!(
            outcomes,
            vec![Distribution {
                ring: 0,
                target: 5,
                assigned: 0,
            }]
        );
        assert_eq!(buildings[&1].population, 0);
    }
}
