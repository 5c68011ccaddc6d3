//! Swiss cities for realistic test fixtures.
//!
//! Coordinates are city centres. Roads link every city to its nearest
//! neighbours, with straight-line distance stretched by a detour factor.

use std::sync::Arc;
use std::time::Duration;

use auction_planner::haversine::HaversineMatrix;
use auction_planner::{RoadNetwork, SearchOptions, Task, Vehicle};

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct City {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl City {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

pub const CITIES: &[City] = &[
    City::new("Geneve", 46.2044, 6.1432),
    City::new("Lausanne", 46.5197, 6.6323),
    City::new("Neuchatel", 46.9900, 6.9293),
    City::new("Fribourg", 46.8065, 7.1620),
    City::new("Bern", 46.9480, 7.4474),
    City::new("Biel", 47.1368, 7.2468),
    City::new("Thun", 46.7580, 7.6280),
    City::new("Sion", 46.2331, 7.3606),
    City::new("Basel", 47.5596, 7.5886),
    City::new("Aarau", 47.3925, 8.0444),
    City::new("Luzern", 47.0502, 8.3093),
    City::new("Zurich", 47.3769, 8.5417),
    City::new("St-Gallen", 47.4245, 9.3767),
    City::new("Lugano", 46.0037, 8.9511),
];

/// Ratio between road and straight-line distance.
pub const DETOUR_FACTOR: f64 = 1.3;

pub const LINKS_PER_CITY: usize = 4;

pub fn swiss_network() -> Arc<RoadNetwork> {
    let names = CITIES.iter().map(|c| c.name.to_string()).collect();
    let points: Vec<_> = CITIES.iter().map(City::coords).collect();
    let network = RoadNetwork::from_points(
        names,
        &points,
        &HaversineMatrix::new(DETOUR_FACTOR),
        LINKS_PER_CITY,
    )
    .expect("swiss network builds");
    Arc::new(network)
}

/// Task between two named cities.
pub fn task(network: &RoadNetwork, id: u32, from: &str, to: &str, weight: u32) -> Task {
    let pickup = network.find(from).expect("known pickup city");
    let delivery = network.find(to).expect("known delivery city");
    Task::new(id, pickup.0, delivery.0, weight)
}

/// Vehicle based in a named city.
pub fn vehicle(network: &RoadNetwork, id: u32, home: &str, capacity: u32, cost_per_km: f64) -> Vehicle {
    let home = network.find(home).expect("known home city");
    Vehicle::new(id, capacity, cost_per_km, home.0)
}

/// Deterministic search: fixed seed, bounded by iterations.
pub fn seeded(seed: u64, iterations: usize) -> SearchOptions {
    SearchOptions {
        seed: Some(seed),
        max_iterations: Some(iterations),
        plan_margin: Duration::ZERO,
    }
}

/// Line of `n` cities, `spacing` km apart.
pub fn line(n: usize, spacing: f64) -> Arc<RoadNetwork> {
    let names = (0..n).map(|i| format!("n{}", i)).collect();
    let roads: Vec<_> = (1..n).map(|i| (i - 1, i, spacing)).collect();
    Arc::new(RoadNetwork::new(names, &roads).expect("line network builds"))
}
