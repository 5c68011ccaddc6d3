//! Auction participant: our own planner, a model of the rival and a
//! pricing rule, driven round by round by the host.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::Deserialize;
use tracing::{debug, info};

use crate::bidding::BidStrategy;
use crate::error::Result;
use crate::fleet::{HomeRandomness, HypothesisOptions};
use crate::model::{Task, Vehicle};
use crate::opponent::{EstimatorOptions, OpponentEstimator};
use crate::plan::VehiclePlan;
use crate::search::{Planner, SearchOptions};
use crate::traits::Geography;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentOptions {
    /// Share of each bid budget spent on our own probe; the rest goes to
    /// the rival estimate.
    pub own_share: f64,
    pub search: SearchOptions,
    pub estimator: EstimatorOptions,
    pub strategy: BidStrategy,
    /// One rival fleet hypothesis per entry, derived from our own fleet.
    pub hypotheses: Vec<HypothesisOptions>,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            own_share: 0.5,
            search: SearchOptions::default(),
            estimator: EstimatorOptions::default(),
            strategy: BidStrategy::default(),
            hypotheses: vec![
                HypothesisOptions::default(),
                HypothesisOptions {
                    same_count: false,
                    same_capacity: false,
                    same_cost: false,
                    home: HomeRandomness::Neighbor,
                },
            ],
        }
    }
}

pub struct AuctionAgent<G: Geography + ?Sized> {
    id: usize,
    planner: Planner<G>,
    rival: OpponentEstimator<G>,
    strategy: BidStrategy,
    own_share: f64,
    won: Vec<Task>,
    payment: u64,
}

impl<G: Geography + ?Sized> AuctionAgent<G> {
    /// `id` is our index in the bid arrays the host reports. Rival fleets
    /// are generated from ours, one per entry of `options.hypotheses`.
    pub fn new(id: usize, geography: Arc<G>, fleet: Vec<Vehicle>, options: AgentOptions) -> Result<Self> {
        let mut rng = match options.search.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };
        let rival = OpponentEstimator::from_reference(
            Arc::clone(&geography),
            &fleet,
            &options.hypotheses,
            options.estimator.clone(),
            &mut rng,
        )?;
        Self::assemble(id, geography, fleet, rival, options)
    }

    /// Like [`AuctionAgent::new`], with the rival fleets given explicitly.
    pub fn with_hypotheses(
        id: usize,
        geography: Arc<G>,
        fleet: Vec<Vehicle>,
        rival_fleets: Vec<Vec<Vehicle>>,
        options: AgentOptions,
    ) -> Result<Self> {
        let rival = OpponentEstimator::new(Arc::clone(&geography), rival_fleets, options.estimator.clone())?;
        Self::assemble(id, geography, fleet, rival, options)
    }

    fn assemble(
        id: usize,
        geography: Arc<G>,
        fleet: Vec<Vehicle>,
        rival: OpponentEstimator<G>,
        options: AgentOptions,
    ) -> Result<Self> {
        let planner = Planner::new(geography, fleet, options.search)?;

        Ok(Self {
            id,
            planner,
            rival,
            strategy: options.strategy,
            own_share: if options.own_share.is_finite() {
                options.own_share.clamp(0.0, 1.0)
            } else {
                AgentOptions::default().own_share
            },
            won: Vec::new(),
            payment: 0,
        })
    }

    pub fn planner(&self) -> &Planner<G> {
        &self.planner
    }

    pub fn rival(&self) -> &OpponentEstimator<G> {
        &self.rival
    }

    pub fn won_tasks(&self) -> &[Task] {
        &self.won
    }

    pub fn payment(&self) -> u64 {
        self.payment
    }

    /// Payments received minus the cost of the committed schedule.
    pub fn profit(&self) -> f64 {
        self.payment as f64 - self.planner.last_confirmed_cost()
    }

    /// Prices `task` within `budget`. `None` withholds the bid: our fleet
    /// cannot carry the task. The rival is estimated either way, so its
    /// hypotheses can follow the round even when we sit it out.
    pub fn ask_price(&mut self, task: &Task, budget: Duration) -> Result<Option<u64>> {
        let own_budget = budget.mul_f64(self.own_share);

        let own = match self.planner.probe(task, own_budget) {
            Ok(probe) => Some(probe.marginal_cost),
            Err(err) if err.is_infeasible() => None,
            Err(err) => return Err(err),
        };

        let rival_budget = budget.saturating_sub(own_budget);
        let rival = match self.rival.estimate_marginal(task, rival_budget) {
            Ok(estimate) => Some(estimate),
            Err(err) if err.is_infeasible() => None,
            Err(err) => return Err(err),
        };

        let Some(own) = own else {
            info!(task = task.id.0, ?rival, "bid withheld, task too heavy for our fleet");
            return Ok(None);
        };

        let bid = self.strategy.bid(own, rival);
        debug!(task = task.id.0, own, ?rival, bid, "bid priced");
        Ok(Some(bid))
    }

    /// Applies the outcome of the auction for `task`. `bids` is indexed by
    /// bidder; `None` marks a withheld bid.
    pub fn auction_result(&mut self, task: &Task, winner: usize, bids: &[Option<u64>]) -> Result<()> {
        let won = winner == self.id;
        if won {
            self.planner.confirm()?;
            self.payment += bids.get(self.id).copied().flatten().unwrap_or(0);
            self.won.push(task.clone());
            info!(task = task.id.0, payment = self.payment, "auction won");
        }

        let rival_bid = bids
            .iter()
            .enumerate()
            .filter(|&(bidder, _)| bidder != self.id)
            .filter_map(|(_, bid)| *bid)
            .min();
        if let Some(bid) = rival_bid {
            self.rival.record_outcome(task, bid as f64, !won);
        }
        Ok(())
    }

    /// Final per-vehicle plans for the tasks we won.
    pub fn plan(&mut self, budget: Duration) -> Vec<VehiclePlan> {
        self.planner.final_plan(budget)
    }
}
