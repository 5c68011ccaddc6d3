//! Domain records: locations, tasks, vehicles and the jobs derived from tasks.

use serde::{Deserialize, Serialize};

/// Index of a location inside a [`Geography`](crate::traits::Geography).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocationId(pub usize);

/// Stable, host-assigned task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub u32);

/// Stable, host-assigned vehicle identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VehicleId(pub u32);

/// A unit of work: carry `weight` from `pickup` to `delivery`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub pickup: LocationId,
    pub delivery: LocationId,
    pub weight: u32,
}

impl Task {
    pub fn new(id: u32, pickup: usize, delivery: usize, weight: u32) -> Self {
        Self {
            id: TaskId(id),
            pickup: LocationId(pickup),
            delivery: LocationId(delivery),
            weight,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub capacity: u32,
    pub cost_per_km: f64,
    pub home: LocationId,
}

impl Vehicle {
    pub fn new(id: u32, capacity: u32, cost_per_km: f64, home: usize) -> Self {
        Self {
            id: VehicleId(id),
            capacity,
            cost_per_km,
            home: LocationId(home),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    Pickup,
    Delivery,
}

/// One half of a task as it sits in a vehicle's chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Job {
    pub task: TaskId,
    pub kind: JobKind,
    pub location: LocationId,
    /// `+weight` at pickup, `-weight` at delivery.
    pub weight_delta: i64,
}
