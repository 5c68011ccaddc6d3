//! Neighbourhood generation for the local search.
//!
//! One vehicle with work is drawn at random, then two operator families are
//! applied to it:
//! - change vehicle: its first pickup and matching delivery become the head
//!   of every other vehicle's chain;
//! - reorder: swap two jobs of its chain when the swap keeps every pickup
//!   ahead of its delivery.
//!
//! Candidates that overload a vehicle are dropped before returning.

use rand::Rng;

use crate::chain::{JobId, RoutingContext, Schedule};
use crate::constraints;
use crate::traits::Geography;

pub fn neighbours<G, R>(schedule: &Schedule, ctx: RoutingContext<'_, G>, rng: &mut R) -> Vec<Schedule>
where
    G: Geography + ?Sized,
    R: Rng,
{
    let busy: Vec<usize> = (0..schedule.vehicle_count())
        .filter(|&vehicle| schedule.head(vehicle).is_some())
        .collect();
    if busy.is_empty() {
        return Vec::new();
    }
    let vehicle = busy[rng.gen_range(0..busy.len())];

    let mut candidates = Vec::new();

    for other in 0..schedule.vehicle_count() {
        if other == vehicle {
            continue;
        }
        if let Some(neighbour) = change_vehicle(schedule, vehicle, other) {
            candidates.push(neighbour);
        }
    }

    let chain = schedule.chain(vehicle);
    for i in 0..chain.len() {
        for j in i + 1..chain.len() {
            // Past its own delivery a pickup can only move too far.
            if chain[i].is_pickup() && chain[j] == chain[i].partner() {
                break;
            }
            if is_valid_swap(&chain, i, j) {
                candidates.push(swap_jobs(schedule, vehicle, &chain, i, j));
            }
        }
    }

    candidates.retain(|candidate| constraints::feasible(candidate, ctx.fleet));
    debug_assert!(candidates.iter().all(constraints::conserves_tasks));
    candidates
}

/// Moves the first task of `from` to the head of `to`.
pub fn change_vehicle(schedule: &Schedule, from: usize, to: usize) -> Option<Schedule> {
    let mut neighbour = schedule.clone();
    let slot = neighbour.detach_first_pair(from)?;
    neighbour.prepend_pair(to, slot);
    Some(neighbour)
}

/// Exchanging positions `i < j` keeps precedence iff neither job jumps
/// over its partner.
pub fn is_valid_swap(chain: &[JobId], i: usize, j: usize) -> bool {
    let (first, second) = (chain[i], chain[j]);
    if first.partner() == second {
        return false;
    }
    let between = &chain[i + 1..j];
    if first.is_pickup() && between.contains(&first.partner()) {
        return false;
    }
    if !second.is_pickup() && between.contains(&second.partner()) {
        return false;
    }
    true
}

pub fn swap_jobs(schedule: &Schedule, vehicle: usize, chain: &[JobId], i: usize, j: usize) -> Schedule {
    let mut order = chain.to_vec();
    order.swap(i, j);
    let mut neighbour = schedule.clone();
    neighbour.relink(vehicle, &order);
    neighbour
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geography::RoadNetwork;
    use crate::model::{JobKind, Task, Vehicle};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn square() -> RoadNetwork {
        let names = (0..4).map(|i| format!("c{}", i)).collect();
        RoadNetwork::new(names, &[(0, 1, 1.0), (1, 2, 1.0), (2, 3, 1.0), (3, 0, 1.0)]).unwrap()
    }

    #[test]
    fn test_empty_schedule_has_no_neighbours() {
        let geo = square();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 1.0, 2)];
        let ctx = RoutingContext::new(&geo, &fleet);
        let mut rng = SmallRng::seed_from_u64(1);

        assert!(neighbours(&Schedule::empty(2), ctx, &mut rng).is_empty());
    }

    #[test]
    fn test_single_task_moves_to_other_vehicle() {
        let geo = square();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 1.0, 2)];
        let ctx = RoutingContext::new(&geo, &fleet);
        let schedule = Schedule::round_robin(ctx, &[Task::new(1, 1, 3, 4)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);

        let found = neighbours(&schedule, ctx, &mut rng);

        assert_eq!(found.len(), 1);
        assert!(found[0].head(0).is_none());
        assert_eq!(found[0].chain(1).len(), 2);
    }

    #[test]
    fn test_change_vehicle_respects_capacity() {
        let geo = square();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 2, 1.0, 2)];
        let ctx = RoutingContext::new(&geo, &fleet);
        let schedule = Schedule::round_robin(ctx, &[Task::new(1, 1, 3, 4)]).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);

        assert!(neighbours(&schedule, ctx, &mut rng).is_empty());
    }

    #[test]
    fn test_valid_swaps_keep_precedence() {
        let geo = square();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0)];
        let ctx = RoutingContext::new(&geo, &fleet);
        let tasks = vec![Task::new(1, 1, 2, 1), Task::new(2, 3, 0, 1), Task::new(3, 2, 1, 1)];
        let schedule = Schedule::round_robin(ctx, &tasks).unwrap();
        let mut rng = SmallRng::seed_from_u64(7);

        let found = neighbours(&schedule, ctx, &mut rng);

        assert!(!found.is_empty());
        for candidate in &found {
            assert!(constraints::conserves_tasks(candidate));
            assert_ne!(candidate.chain(0), schedule.chain(0));
        }
    }

    #[test]
    fn test_is_valid_swap_rules() {
        let geo = square();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0)];
        let ctx = RoutingContext::new(&geo, &fleet);
        let schedule =
            Schedule::round_robin(ctx, &[Task::new(1, 1, 2, 1), Task::new(2, 3, 0, 1)]).unwrap();
        // p1 d1 p2 d2
        let chain = schedule.chain(0);
        assert_eq!(schedule.job(chain[2]).kind, JobKind::Pickup);

        assert!(!is_valid_swap(&chain, 0, 1));
        assert!(is_valid_swap(&chain, 1, 2));
        assert!(!is_valid_swap(&chain, 0, 2));
        assert!(!is_valid_swap(&chain, 1, 3));
        assert!(!is_valid_swap(&chain, 2, 3));
    }
}
