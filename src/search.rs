//! Time-bounded stochastic local search.
//!
//! Each iteration draws the neighbourhood of the current schedule and picks
//! a candidate: with probability `temperature` a uniformly random
//! neighbour, otherwise the cheapest one (ties broken by a coin flip). The
//! candidate replaces the current schedule if it is cheaper, or if a second
//! draw falls at or below `temperature`. Temperature falls linearly from 1
//! to 0 over the budget. The best schedule seen is what gets returned.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::chain::{self, RoutingContext, Schedule};
use crate::error::{PlannerError, Result};
use crate::model::{LocationId, Task, Vehicle};
use crate::neighborhood;
use crate::plan::{self, VehiclePlan};
use crate::traits::Geography;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    /// Seed for the planner's random generator. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Stop after this many iterations even if time remains. When set, the
    /// temperature cools over iterations instead of wall-clock time.
    pub max_iterations: Option<usize>,
    /// Reserved from the `final_plan` budget for the host.
    pub plan_margin: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            seed: None,
            max_iterations: None,
            plan_margin: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchReport {
    pub start_cost: f64,
    pub cost: f64,
    pub iterations: usize,
    pub accepted: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    /// Optimised cost with the task minus the confirmed cost without it.
    pub marginal_cost: f64,
    pub report: SearchReport,
}

/// Search state of one fleet: the committed schedule plus the most recent
/// speculative one.
pub struct Planner<G: Geography + ?Sized> {
    geography: Arc<G>,
    fleet: Vec<Vehicle>,
    confirmed: Schedule,
    speculative: Option<Schedule>,
    last_confirmed_cost: f64,
    last_simulated_cost: f64,
    options: SearchOptions,
    rng: SmallRng,
}

impl<G: Geography + ?Sized> Planner<G> {
    pub fn new(geography: Arc<G>, fleet: Vec<Vehicle>, options: SearchOptions) -> Result<Self> {
        if fleet.is_empty() {
            return Err(PlannerError::EmptyFleet);
        }
        for vehicle in &fleet {
            chain::check_location(&*geography, vehicle.home)?;
        }
        let rng = match options.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let confirmed = Schedule::empty(fleet.len());

        Ok(Self {
            geography,
            fleet,
            confirmed,
            speculative: None,
            last_confirmed_cost: 0.0,
            last_simulated_cost: 0.0,
            options,
            rng,
        })
    }

    /// Planner whose committed schedule already holds `tasks`, spread
    /// round-robin over the fleet.
    pub fn with_tasks(
        geography: Arc<G>,
        fleet: Vec<Vehicle>,
        tasks: &[Task],
        options: SearchOptions,
    ) -> Result<Self> {
        let mut planner = Self::new(geography, fleet, options)?;
        planner.confirmed = Schedule::round_robin(planner.context(), tasks)?;
        planner.last_confirmed_cost = planner.confirmed.cost(planner.context());
        Ok(planner)
    }

    pub fn context(&self) -> RoutingContext<'_, G> {
        RoutingContext::new(&*self.geography, &self.fleet)
    }

    pub fn geography(&self) -> &Arc<G> {
        &self.geography
    }

    pub fn fleet(&self) -> &[Vehicle] {
        &self.fleet
    }

    pub fn confirmed(&self) -> &Schedule {
        &self.confirmed
    }

    pub fn speculative(&self) -> Option<&Schedule> {
        self.speculative.as_ref()
    }

    pub fn last_confirmed_cost(&self) -> f64 {
        self.last_confirmed_cost
    }

    pub fn last_simulated_cost(&self) -> f64 {
        self.last_simulated_cost
    }

    pub(crate) fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    /// Optimises `schedule` until `budget` runs out and returns the best
    /// schedule seen.
    pub fn finalize(&mut self, schedule: Schedule, budget: Duration) -> (Schedule, SearchReport) {
        let ctx = RoutingContext::new(&*self.geography, &self.fleet);
        anneal(schedule, ctx, budget, self.options.max_iterations, &mut self.rng)
    }

    /// Estimates the marginal cost of adding `task` to the committed
    /// schedule. The optimised schedule is kept for [`Planner::confirm`].
    pub fn probe(&mut self, task: &Task, budget: Duration) -> Result<ProbeResult> {
        let started = Instant::now();
        let start_cost = self.confirmed.cost(self.context());

        let inserted = match self.confirmed.insert(task, self.context()) {
            Ok(schedule) => schedule,
            Err(err) => {
                warn!(task = task.id.0, error = %err, "task cannot be inserted");
                self.speculative = None;
                return Err(err);
            }
        };

        let remaining = budget.saturating_sub(started.elapsed());
        let (best, report) = self.finalize(inserted, remaining);
        let marginal_cost = report.cost - start_cost;

        debug!(
            task = task.id.0,
            marginal_cost,
            iterations = report.iterations,
            accepted = report.accepted,
            "probe finished"
        );

        self.last_simulated_cost = report.cost;
        self.speculative = Some(best);
        Ok(ProbeResult {
            marginal_cost,
            report,
        })
    }

    /// Commits the last speculative schedule.
    pub fn confirm(&mut self) -> Result<()> {
        let schedule = self.speculative.take().ok_or(PlannerError::NothingToConfirm)?;
        self.confirmed = schedule;
        self.last_confirmed_cost = self.confirmed.cost(self.context());
        info!(
            tasks = self.confirmed.task_count(),
            cost = self.last_confirmed_cost,
            "schedule confirmed"
        );
        Ok(())
    }

    /// Optimises the committed schedule within `budget` minus the plan
    /// margin and emits one plan per vehicle.
    pub fn final_plan(&mut self, budget: Duration) -> Vec<VehiclePlan> {
        let budget = budget.saturating_sub(self.options.plan_margin);
        let mut schedule = self.confirmed.clone();

        if schedule.task_count() > 0 {
            let (best, report) = self.finalize(schedule, budget);
            info!(
                start_cost = report.start_cost,
                cost = report.cost,
                iterations = report.iterations,
                "final plan optimised"
            );
            self.last_simulated_cost = report.cost;
            schedule = best;
        }

        let plans = plan::emit(&schedule, self.context());
        self.speculative = Some(schedule);
        plans
    }

    /// Moves a vehicle's home. Running totals are recomputed. Returns false
    /// for an unknown vehicle or location.
    pub fn relocate_vehicle(&mut self, vehicle: usize, home: LocationId) -> bool {
        if chain::check_location(&*self.geography, home).is_err() {
            return false;
        }
        let Some(entry) = self.fleet.get_mut(vehicle) else {
            return false;
        };
        entry.home = home;
        self.refresh_costs();
        true
    }

    /// Drops an idle vehicle from the fleet. Refuses unknown indices, the
    /// last vehicle and any vehicle with work in either schedule.
    pub fn remove_vehicle(&mut self, vehicle: usize) -> bool {
        if vehicle >= self.fleet.len()
            || self.fleet.len() <= 1
            || self.confirmed.head(vehicle).is_some()
        {
            return false;
        }
        if let Some(speculative) = &self.speculative {
            if speculative.head(vehicle).is_some() {
                return false;
            }
        }

        self.confirmed.remove_vehicle(vehicle);
        if let Some(speculative) = self.speculative.as_mut() {
            speculative.remove_vehicle(vehicle);
        }
        self.fleet.remove(vehicle);
        true
    }

    fn refresh_costs(&mut self) {
        let ctx = RoutingContext::new(&*self.geography, &self.fleet);
        self.last_confirmed_cost = self.confirmed.cost(ctx);
        if let Some(speculative) = &self.speculative {
            self.last_simulated_cost = speculative.cost(ctx);
        }
    }
}

/// Runs the search loop from `start` and returns the best schedule seen.
pub fn anneal<G, R>(
    start: Schedule,
    ctx: RoutingContext<'_, G>,
    budget: Duration,
    max_iterations: Option<usize>,
    rng: &mut R,
) -> (Schedule, SearchReport)
where
    G: Geography + ?Sized,
    R: Rng,
{
    let started = Instant::now();
    let start_cost = start.cost(ctx);
    let mut current = start;
    let mut current_cost = start_cost;
    let mut best = current.clone();
    let mut best_cost = start_cost;
    let mut temperature = 1.0;
    let mut iterations = 0;
    let mut accepted = 0;

    while current.task_count() > 0 && started.elapsed() < budget {
        if max_iterations.is_some_and(|max| iterations >= max) {
            break;
        }
        iterations += 1;

        let candidates = neighborhood::neighbours(&current, ctx, rng);
        if candidates.is_empty() && busy_vehicles(&current) <= 1 {
            // Nothing to move and nowhere else to draw from.
            break;
        }
        if let Some((candidate, cost)) = local_choice(candidates, ctx, temperature, rng) {
            if cost < current_cost || rng.r#gen::<f64>() <= temperature {
                current = candidate;
                current_cost = cost;
                accepted += 1;
                if current_cost < best_cost {
                    best = current.clone();
                    best_cost = current_cost;
                }
            }
        }

        temperature = cooling(started.elapsed(), budget, iterations, max_iterations);
    }

    let report = SearchReport {
        start_cost,
        cost: best_cost,
        iterations,
        accepted,
        elapsed: started.elapsed(),
    };
    (best, report)
}

fn busy_vehicles(schedule: &Schedule) -> usize {
    (0..schedule.vehicle_count())
        .filter(|&vehicle| schedule.head(vehicle).is_some())
        .count()
}

/// Random neighbour with probability `temperature`, else the cheapest.
fn local_choice<G, R>(
    candidates: Vec<Schedule>,
    ctx: RoutingContext<'_, G>,
    temperature: f64,
    rng: &mut R,
) -> Option<(Schedule, f64)>
where
    G: Geography + ?Sized,
    R: Rng,
{
    if candidates.is_empty() {
        return None;
    }

    if rng.r#gen::<f64>() <= temperature {
        let index = rng.gen_range(0..candidates.len());
        let chosen = candidates.into_iter().nth(index)?;
        let cost = chosen.cost(ctx);
        return Some((chosen, cost));
    }

    let mut best: Option<(Schedule, f64)> = None;
    for candidate in candidates {
        let cost = candidate.cost(ctx);
        let replace = match &best {
            None => true,
            Some((_, best_cost)) => cost < *best_cost || (cost == *best_cost && rng.gen_bool(0.5)),
        };
        if replace {
            best = Some((candidate, cost));
        }
    }
    best
}

/// Linear cooling. With an iteration cap the schedule depends only on the
/// iteration count, so seeded runs replay exactly.
fn cooling(elapsed: Duration, budget: Duration, iterations: usize, max_iterations: Option<usize>) -> f64 {
    let fraction = match max_iterations {
        Some(max) if max > 0 => iterations as f64 / max as f64,
        _ if budget.is_zero() => 1.0,
        _ => elapsed.as_secs_f64() / budget.as_secs_f64(),
    };
    (1.0 - fraction).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraints;
    use crate::geography::RoadNetwork;

    fn grid() -> Arc<RoadNetwork> {
        // 3x3 grid, 10 km edges.
        let names = (0..9).map(|i| format!("g{}", i)).collect();
        let mut roads = Vec::new();
        for row in 0..3 {
            for col in 0..3 {
                let id = row * 3 + col;
                if col < 2 {
                    roads.push((id, id + 1, 10.0));
                }
                if row < 2 {
                    roads.push((id, id + 3, 10.0));
                }
            }
        }
        Arc::new(RoadNetwork::new(names, &roads).unwrap())
    }

    fn options(seed: u64, iterations: usize) -> SearchOptions {
        SearchOptions {
            seed: Some(seed),
            max_iterations: Some(iterations),
            plan_margin: Duration::ZERO,
        }
    }

    #[test]
    fn test_cooling_is_linear() {
        let budget = Duration::from_secs(10);
        assert_eq!(cooling(Duration::ZERO, budget, 0, None), 1.0);
        assert!((cooling(Duration::from_secs(5), budget, 0, None) - 0.5).abs() < 1e-9);
        assert_eq!(cooling(Duration::from_secs(20), budget, 0, None), 0.0);
        assert!((cooling(Duration::from_secs(9), budget, 75, Some(100)) - 0.25).abs() < 1e-9);
        assert_eq!(cooling(Duration::ZERO, Duration::ZERO, 0, None), 0.0);
    }

    #[test]
    fn test_finalize_never_worse_than_start() {
        let geo = grid();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 2.0, 8)];
        let tasks: Vec<_> = (0..6)
            .map(|i| Task::new(i, (i as usize * 2) % 9, (i as usize * 5 + 1) % 9, 3))
            .collect();
        let mut planner =
            Planner::with_tasks(geo, fleet, &tasks, options(11, 300)).unwrap();
        let start = planner.confirmed().clone();
        let start_cost = start.cost(planner.context());

        let (best, report) = planner.finalize(start, Duration::from_secs(5));

        assert!(report.cost <= start_cost);
        assert_eq!(best.cost(planner.context()), report.cost);
        assert!(constraints::feasible(&best, planner.fleet()));
        assert!(constraints::conserves_tasks(&best));
        assert_eq!(best.task_count(), 6);
    }

    #[test]
    fn test_probe_then_confirm_commits_schedule() {
        let geo = grid();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 1.0, 8)];
        let mut planner = Planner::new(geo, fleet, options(3, 50)).unwrap();

        let probe = planner.probe(&Task::new(1, 1, 2, 4), Duration::from_secs(2)).unwrap();
        // Home 0 -> 1 -> 2 at 1.0 per km.
        assert_eq!(probe.marginal_cost, 20.0);
        assert_eq!(planner.confirmed().task_count(), 0);

        planner.confirm().unwrap();
        assert_eq!(planner.confirmed().task_count(), 1);
        assert_eq!(planner.last_confirmed_cost(), 20.0);
        assert!(matches!(planner.confirm(), Err(PlannerError::NothingToConfirm)));
    }

    #[test]
    fn test_probe_infeasible_task_is_typed_error() {
        let geo = grid();
        let fleet = vec![Vehicle::new(0, 5, 1.0, 0), Vehicle::new(1, 5, 1.0, 8)];
        let mut planner = Planner::new(geo, fleet, options(3, 10)).unwrap();

        let err = planner.probe(&Task::new(1, 1, 2, 6), Duration::from_secs(1)).unwrap_err();

        assert!(err.is_infeasible());
        assert!(planner.speculative().is_none());
    }

    #[test]
    fn test_zero_budget_probe_still_answers() {
        let geo = grid();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0)];
        let mut planner = Planner::new(geo, fleet, options(3, 10)).unwrap();

        let probe = planner.probe(&Task::new(1, 0, 2, 1), Duration::ZERO).unwrap();

        assert_eq!(probe.report.iterations, 0);
        assert_eq!(probe.marginal_cost, 20.0);
    }

    #[test]
    fn test_same_seed_replays_identically() {
        let tasks: Vec<_> = (0..5).map(|i| Task::new(i, i as usize, 8 - i as usize, 2)).collect();
        let run = || {
            let fleet = vec![Vehicle::new(0, 6, 1.0, 0), Vehicle::new(1, 6, 1.0, 4)];
            let mut planner = Planner::with_tasks(grid(), fleet, &tasks, options(99, 200)).unwrap();
            let start = planner.confirmed().clone();
            let (best, report) = planner.finalize(start, Duration::from_secs(5));
            (best.chain(0), best.chain(1), report.cost, report.iterations)
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_final_plan_covers_every_vehicle() {
        let geo = grid();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 1.0, 8)];
        let mut planner = Planner::new(geo, fleet, options(5, 50)).unwrap();
        planner.probe(&Task::new(1, 7, 6, 4), Duration::from_secs(1)).unwrap();
        planner.confirm().unwrap();

        let plans = planner.final_plan(Duration::from_secs(1));

        assert_eq!(plans.len(), 2);
        let pickups = plans
            .iter()
            .flat_map(|p| &p.actions)
            .filter(|a| matches!(a, plan::Action::Pickup(_)))
            .count();
        assert_eq!(pickups, 1);
    }

    #[test]
    fn test_remove_vehicle_guards_busy_and_last() {
        let geo = grid();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 1.0, 8)];
        let mut planner =
            Planner::with_tasks(geo, fleet, &[Task::new(1, 1, 2, 1)], options(1, 10)).unwrap();

        assert!(!planner.remove_vehicle(0));
        assert!(planner.remove_vehicle(1));
        assert_eq!(planner.fleet().len(), 1);
        assert!(!planner.remove_vehicle(0));
    }

    #[test]
    fn test_fleet_mutations_reject_unknown_indices() {
        let geo = grid();
        let fleet = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 1.0, 8)];
        let mut planner = Planner::new(geo, fleet, options(2, 10)).unwrap();

        assert!(!planner.remove_vehicle(5));
        assert!(!planner.relocate_vehicle(5, LocationId(0)));
        assert!(!planner.relocate_vehicle(0, LocationId(99)));
        assert_eq!(planner.fleet()[0].home, LocationId(0));
        assert_eq!(planner.fleet().len(), 2);

        assert!(planner.relocate_vehicle(0, LocationId(4)));
        assert_eq!(planner.fleet()[0].home, LocationId(4));
    }

    #[test]
    fn test_unknown_locations_are_errors() {
        let geo = grid();
        let stray = vec![Vehicle::new(0, 10, 1.0, 0), Vehicle::new(1, 10, 1.0, 42)];
        assert!(matches!(
            Planner::new(geo.clone(), stray, options(4, 10)),
            Err(PlannerError::UnknownLocation(LocationId(42)))
        ));

        let mut planner = Planner::new(geo, vec![Vehicle::new(0, 10, 1.0, 0)], options(4, 10)).unwrap();
        let err = planner.probe(&Task::new(1, 0, 70, 1), Duration::from_secs(1)).unwrap_err();

        assert!(matches!(err, PlannerError::UnknownLocation(LocationId(70))));
        assert!(planner.speculative().is_none());
    }

    #[test]
    fn test_search_stops_when_no_move_exists() {
        let geo = grid();
        let unbounded = SearchOptions {
            seed: Some(1),
            max_iterations: None,
            plan_margin: Duration::ZERO,
        };
        let mut planner = Planner::new(geo, vec![Vehicle::new(0, 10, 1.0, 0)], unbounded).unwrap();

        let probe = planner.probe(&Task::new(1, 1, 2, 1), Duration::from_secs(30)).unwrap();

        assert_eq!(probe.report.iterations, 1);
        assert!(probe.report.elapsed < Duration::from_secs(5));
        assert_eq!(probe.marginal_cost, 20.0);
    }
}
