//! Constraint checks on schedules.
//!
//! Precedence and task completeness hold by construction of the
//! neighbourhood operators, so only capacity needs checking during search.
//! [`conserves_tasks`] verifies the structural invariants and is used by
//! debug assertions and tests.

use std::collections::HashSet;

use crate::chain::Schedule;
use crate::model::Vehicle;

/// True iff no vehicle ever carries more than its capacity.
pub fn feasible(schedule: &Schedule, fleet: &[Vehicle]) -> bool {
    fleet
        .iter()
        .enumerate()
        .all(|(index, vehicle)| peak_load(schedule, index) <= i64::from(vehicle.capacity))
}

/// Largest weight carried at any point along the vehicle's chain.
pub fn peak_load(schedule: &Schedule, vehicle: usize) -> i64 {
    let mut load = 0i64;
    let mut peak = 0i64;
    let mut current = schedule.head(vehicle);
    while let Some(job) = current {
        load += schedule.job(job).weight_delta;
        peak = peak.max(load);
        current = schedule.next(job);
    }
    peak
}

/// Every task appears exactly once as a pickup and once as a delivery, in
/// the same chain, pickup strictly first.
pub fn conserves_tasks(schedule: &Schedule) -> bool {
    let mut picked = HashSet::new();
    let mut delivered = HashSet::new();

    for vehicle in 0..schedule.vehicle_count() {
        let mut open = HashSet::new();
        for job in schedule.chain(vehicle) {
            let slot = job.slot();
            if job.is_pickup() {
                if !picked.insert(slot) {
                    return false;
                }
                open.insert(slot);
            } else {
                if !open.remove(&slot) || !delivered.insert(slot) {
                    return false;
                }
            }
        }
        if !open.is_empty() {
            return false;
        }
    }

    picked.len() == schedule.task_count() && delivered.len() == schedule.task_count()
}
