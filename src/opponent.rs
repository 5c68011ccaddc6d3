//! Rival cost model.
//!
//! Each hypothesis is a guessed rival fleet with its own [`Planner`]. A
//! query probes every hypothesis and averages their marginal costs, scaled
//! by how the rival's bids have compared with our predictions so far.
//! Observed bids feed back into the hypotheses: the first round anchors a
//! vehicle's depot to the bid, later large misses reshuffle the depots.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{PlannerError, Result};
use crate::fleet::{self, HypothesisOptions};
use crate::model::{LocationId, Task, Vehicle};
use crate::search::{Planner, SearchOptions};
use crate::traits::Geography;

/// Candidate depots tried per city when relocating a competing vehicle.
const RELOCATION_ATTEMPTS_PER_CITY: usize = 10;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EstimatorOptions {
    /// Observed/predicted ratios outside this band are ignored.
    pub ratio_band: (f64, f64),
    /// Weight of a new ratio in the running average.
    pub ratio_blend: f64,
    /// Relative prediction error that triggers a depot reshuffle.
    pub divergence_threshold: f64,
    pub search: SearchOptions,
}

impl Default for EstimatorOptions {
    fn default() -> Self {
        Self {
            ratio_band: (0.9, 1.5),
            ratio_blend: 0.5,
            divergence_threshold: 0.5,
            search: SearchOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Recalibration {
    Unchanged,
    /// `vehicle` moved to `home`; `pruned` competing vehicles dropped.
    Anchored {
        vehicle: usize,
        home: LocationId,
        pruned: usize,
    },
    Reshuffled,
}

/// Relative miss of a prediction against an observed bid.
pub fn diverges(predicted: f64, observed: f64, threshold: f64) -> bool {
    (predicted - observed).abs() / observed.abs().max(1.0) > threshold
}

pub struct OpponentModel<G: Geography + ?Sized> {
    planner: Planner<G>,
    last_marginal: Option<f64>,
}

impl<G: Geography + ?Sized> OpponentModel<G> {
    pub fn planner(&self) -> &Planner<G> {
        &self.planner
    }

    pub fn last_marginal(&self) -> Option<f64> {
        self.last_marginal
    }

    /// Adjusts this hypothesis after an auction. The first round always
    /// anchors; later rounds reshuffle depots when the prediction missed.
    pub fn recalibrate(
        &mut self,
        observed_bid: f64,
        predicted_bid: f64,
        first_round: bool,
        threshold: f64,
    ) -> Recalibration {
        if first_round {
            if let Some(anchored) = self.anchor(observed_bid) {
                return anchored;
            }
        }
        if diverges(predicted_bid, observed_bid, threshold) {
            self.reshuffle();
            return Recalibration::Reshuffled;
        }
        Recalibration::Unchanged
    }

    /// Moves the vehicle serving the auctioned task to the depot whose
    /// approach plus delivery cost best matches `observed_bid`, then pushes
    /// every vehicle that would have been cheaper away from the pickup, or
    /// drops it when no such depot is found.
    fn anchor(&mut self, observed_bid: f64) -> Option<Recalibration> {
        let geography = Arc::clone(self.planner.geography());
        let speculative = self.planner.speculative()?;
        let (anchor, head) = (0..speculative.vehicle_count())
            .find_map(|vehicle| speculative.head(vehicle).map(|job| (vehicle, job)))?;
        let task = speculative.task_of(head).clone();

        let cost_per_km = self.planner.fleet()[anchor].cost_per_km;
        let carry = geography.distance(task.pickup, task.delivery) * cost_per_km;
        let miss = |approach: f64| (observed_bid - (approach + carry)).abs();

        let (home, approach) = geography
            .locations()
            .into_iter()
            .map(|city| (city, geography.distance(city, task.pickup) * cost_per_km))
            .filter(|(_, approach)| approach.is_finite())
            .min_by(|(_, a), (_, b)| miss(*a).total_cmp(&miss(*b)))?;
        self.planner.relocate_vehicle(anchor, home);

        let mut used: HashSet<LocationId> = self.planner.fleet().iter().map(|v| v.home).collect();
        let attempts = geography.location_count() * RELOCATION_ATTEMPTS_PER_CITY;
        let mut excess = Vec::new();

        for vehicle in 0..self.planner.fleet().len() {
            if vehicle == anchor {
                continue;
            }
            let other = self.planner.fleet()[vehicle].clone();
            let undercut = |city: LocationId| {
                geography.distance(city, task.pickup) * other.cost_per_km < approach
            };
            if !undercut(other.home) {
                continue;
            }

            used.remove(&other.home);
            let mut relocated = None;
            for _ in 0..attempts {
                let Some(city) = fleet::random_location(&*geography, self.planner.rng()) else {
                    break;
                };
                if !used.contains(&city) && !undercut(city) {
                    relocated = Some(city);
                    break;
                }
            }

            match relocated {
                Some(city) => {
                    self.planner.relocate_vehicle(vehicle, city);
                    used.insert(city);
                }
                None => excess.push(vehicle),
            }
        }

        // Indices shift down as vehicles ahead of the anchor are dropped.
        let mut pruned = 0;
        let mut anchor = anchor;
        for vehicle in excess.into_iter().rev() {
            if self.planner.remove_vehicle(vehicle) {
                pruned += 1;
                if vehicle < anchor {
                    anchor -= 1;
                }
            }
        }

        info!(vehicle = anchor, home = home.0, pruned, "rival depot anchored");
        Some(Recalibration::Anchored {
            vehicle: anchor,
            home,
            pruned,
        })
    }

    /// Gives every vehicle a fresh random depot, distinct while cities last.
    fn reshuffle(&mut self) {
        let geography = Arc::clone(self.planner.geography());
        let cities = geography.location_count();
        if cities == 0 {
            return;
        }
        let mut used: HashSet<LocationId> = self.planner.fleet().iter().map(|v| v.home).collect();

        for vehicle in 0..self.planner.fleet().len() {
            used.remove(&self.planner.fleet()[vehicle].home);
            let home = loop {
                let city = LocationId(self.planner.rng().gen_range(0..cities));
                if used.len() >= cities || !used.contains(&city) {
                    break city;
                }
            };
            self.planner.relocate_vehicle(vehicle, home);
            used.insert(home);
        }
        info!(vehicles = self.planner.fleet().len(), "rival depots reshuffled");
    }
}

pub struct OpponentEstimator<G: Geography + ?Sized> {
    models: Vec<OpponentModel<G>>,
    average_ratio: f64,
    last_prediction: Option<f64>,
    rounds: usize,
    options: EstimatorOptions,
}

impl<G: Geography + ?Sized> OpponentEstimator<G> {
    /// One model per hypothesised fleet. Seeds are derived from the search
    /// seed so hypotheses do not share a random stream.
    pub fn new(geography: Arc<G>, hypotheses: Vec<Vec<Vehicle>>, options: EstimatorOptions) -> Result<Self> {
        if hypotheses.is_empty() {
            return Err(PlannerError::EmptyFleet);
        }

        let models = hypotheses
            .into_iter()
            .enumerate()
            .map(|(index, fleet)| {
                let search = SearchOptions {
                    seed: options.search.seed.map(|seed| seed.wrapping_add(index as u64)),
                    ..options.search.clone()
                };
                Planner::new(Arc::clone(&geography), fleet, search).map(|planner| OpponentModel {
                    planner,
                    last_marginal: None,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            models,
            average_ratio: 1.0,
            last_prediction: None,
            rounds: 0,
            options,
        })
    }

    /// Generates one hypothesis per entry of `hypotheses` from `reference`.
    pub fn from_reference<R: Rng>(
        geography: Arc<G>,
        reference: &[Vehicle],
        hypotheses: &[HypothesisOptions],
        options: EstimatorOptions,
        rng: &mut R,
    ) -> Result<Self> {
        let fleets = hypotheses
            .iter()
            .map(|hypothesis| fleet::generate(reference, hypothesis, &*geography, rng))
            .collect();
        Self::new(geography, fleets, options)
    }

    pub fn models(&self) -> &[OpponentModel<G>] {
        &self.models
    }

    pub fn average_ratio(&self) -> f64 {
        self.average_ratio
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Average marginal cost over the hypotheses able to carry the task,
    /// scaled by the running observed/predicted ratio. The budget is split
    /// evenly; hypotheses are probed in parallel.
    pub fn estimate_marginal(&mut self, task: &Task, budget: Duration) -> Result<f64> {
        let share = budget / self.models.len() as u32;

        let outcomes: Vec<Result<f64>> = self
            .models
            .par_iter_mut()
            .map(|model| {
                let outcome = model.planner.probe(task, share).map(|probe| probe.marginal_cost);
                model.last_marginal = outcome.as_ref().ok().copied();
                outcome
            })
            .collect();

        let mut marginals = Vec::new();
        let mut failure = None;
        for outcome in outcomes {
            match outcome {
                Ok(marginal) => marginals.push(marginal),
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }

        if marginals.is_empty() {
            self.last_prediction = None;
            return Err(failure.unwrap_or(PlannerError::EmptyFleet));
        }

        let raw = marginals.iter().sum::<f64>() / marginals.len() as f64;
        self.last_prediction = Some(raw);
        debug!(task = task.id.0, raw, ratio = self.average_ratio, "rival marginal estimated");
        Ok(raw * self.average_ratio)
    }

    /// Feeds an auction result back: recalibrates the hypotheses, updates
    /// the bid ratio, and commits the task to every hypothesis that planned
    /// it if the rival won.
    pub fn record_outcome(&mut self, task: &Task, observed_bid: f64, rival_won: bool) -> Vec<Recalibration> {
        let changes = self.recalibrate(observed_bid);

        if let Some(predicted) = self.last_prediction {
            self.observe_ratio(predicted, observed_bid);
        }

        if rival_won {
            for model in &mut self.models {
                let planned = model
                    .planner
                    .speculative()
                    .is_some_and(|schedule| schedule.vehicle_of(task.id).is_some());
                if planned {
                    if let Err(err) = model.planner.confirm() {
                        warn!(error = %err, "rival hypothesis could not commit task");
                    }
                }
            }
        }

        for model in &mut self.models {
            model.last_marginal = None;
        }
        self.last_prediction = None;
        self.rounds += 1;
        changes
    }

    /// Blends `observed / predicted` into the running ratio when it lies in
    /// the sane band. Returns whether the ratio moved.
    pub fn observe_ratio(&mut self, predicted: f64, observed: f64) -> bool {
        if !(predicted.is_finite() && predicted > 0.0) {
            return false;
        }
        let ratio = observed / predicted;
        let (low, high) = self.options.ratio_band;
        if !(low..=high).contains(&ratio) {
            debug!(ratio, "bid ratio outside band, ignored");
            return false;
        }
        let blend = self.options.ratio_blend;
        self.average_ratio = blend * ratio + (1.0 - blend) * self.average_ratio;
        true
    }

    /// Compares each hypothesis' prediction for the last auction with the
    /// observed bid and adjusts depots accordingly.
    pub fn recalibrate(&mut self, observed_bid: f64) -> Vec<Recalibration> {
        let first_round = self.rounds == 0;
        let threshold = self.options.divergence_threshold;
        let ratio = self.average_ratio;

        self.models
            .iter_mut()
            .map(|model| match model.last_marginal {
                Some(marginal) => model.recalibrate(observed_bid, marginal * ratio, first_round, threshold),
                None => Recalibration::Unchanged,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diverges_relative_to_observed() {
        assert!(!diverges(100.0, 120.0, 0.5));
        assert!(diverges(100.0, 250.0, 0.5));
        assert!(diverges(10.0, 0.0, 0.5));
        assert!(!diverges(0.2, 0.0, 0.5));
    }
}
