//! auction-planner
//!
//! Pickup-and-delivery routing for a fleet bidding on tasks one at a time:
//! marginal cost probes by stochastic local search, plus a model of the
//! rival's costs built from hypothesised fleets.

pub mod agent;
pub mod bidding;
pub mod chain;
pub mod constraints;
pub mod error;
pub mod fleet;
pub mod geography;
pub mod haversine;
pub mod model;
pub mod neighborhood;
pub mod opponent;
pub mod osrm;
pub mod plan;
pub mod search;
pub mod traits;

pub use agent::{AgentOptions, AuctionAgent};
pub use error::{PlannerError, Result};
pub use geography::RoadNetwork;
pub use model::{LocationId, Task, TaskId, Vehicle, VehicleId};
pub use search::{Planner, SearchOptions};
