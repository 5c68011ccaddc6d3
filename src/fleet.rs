//! Hypothetical rival fleets derived from a reference fleet.

use rand::Rng;
use serde::Deserialize;

use crate::model::{LocationId, Vehicle, VehicleId};
use crate::traits::Geography;

/// Smallest fleet a jittered count may produce.
const MIN_JITTERED_FLEET: usize = 2;

/// Range of the random scale applied to capacity and cost per km.
const SCALE_RANGE: (f64, f64) = (0.8, 1.2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HomeRandomness {
    /// Keep the reference vehicle's home.
    Fixed,
    /// A random city adjacent to the reference home.
    Neighbor,
    /// Any city of the geography.
    Anywhere,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HypothesisOptions {
    pub same_count: bool,
    pub same_capacity: bool,
    pub same_cost: bool,
    pub home: HomeRandomness,
}

impl Default for HypothesisOptions {
    fn default() -> Self {
        Self {
            same_count: true,
            same_capacity: true,
            same_cost: true,
            home: HomeRandomness::Anywhere,
        }
    }
}

/// Builds a synthetic fleet from `reference`. Extra vehicles created by a
/// count jitter copy the reference vehicles in order.
pub fn generate<G, R>(
    reference: &[Vehicle],
    options: &HypothesisOptions,
    geography: &G,
    rng: &mut R,
) -> Vec<Vehicle>
where
    G: Geography + ?Sized,
    R: Rng,
{
    if reference.is_empty() {
        return Vec::new();
    }

    let count = if options.same_count {
        reference.len()
    } else {
        let jitter: i64 = rng.gen_range(-1..=1);
        (reference.len() as i64 + jitter).max(MIN_JITTERED_FLEET as i64) as usize
    };

    (0..count)
        .map(|index| {
            let base = &reference[index % reference.len()];

            let capacity = if options.same_capacity {
                base.capacity
            } else {
                let scaled = f64::from(base.capacity) * rng.gen_range(SCALE_RANGE.0..=SCALE_RANGE.1);
                (scaled.round() as u32).max(1)
            };

            let cost_per_km = if options.same_cost {
                base.cost_per_km
            } else {
                base.cost_per_km * rng.gen_range(SCALE_RANGE.0..=SCALE_RANGE.1)
            };

            let home = pick_home(base.home, options.home, geography, rng);

            Vehicle {
                id: VehicleId(index as u32),
                capacity,
                cost_per_km,
                home,
            }
        })
        .collect()
}

fn pick_home<G, R>(home: LocationId, randomness: HomeRandomness, geography: &G, rng: &mut R) -> LocationId
where
    G: Geography + ?Sized,
    R: Rng,
{
    match randomness {
        HomeRandomness::Fixed => home,
        HomeRandomness::Neighbor => {
            let around = geography.neighbors(home);
            if around.is_empty() {
                home
            } else {
                around[rng.gen_range(0..around.len())]
            }
        }
        HomeRandomness::Anywhere => random_location(geography, rng).unwrap_or(home),
    }
}

pub(crate) fn random_location<G, R>(geography: &G, rng: &mut R) -> Option<LocationId>
where
    G: Geography + ?Sized,
    R: Rng,
{
    let count = geography.location_count();
    (count > 0).then(|| LocationId(rng.gen_range(0..count)))
}
