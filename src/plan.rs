//! Turns a converged schedule into per-vehicle action lists.

use serde::Serialize;

use crate::chain::{RoutingContext, Schedule};
use crate::model::{JobKind, LocationId, TaskId, VehicleId};
use crate::traits::Geography;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "target", rename_all = "snake_case")]
pub enum Action {
    Move(LocationId),
    Pickup(TaskId),
    Deliver(TaskId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehiclePlan {
    pub vehicle: VehicleId,
    pub home: LocationId,
    pub actions: Vec<Action>,
    pub distance: f64,
}

impl VehiclePlan {
    pub fn is_idle(&self) -> bool {
        self.actions.is_empty()
    }
}

/// One plan per fleet vehicle, in fleet order. Moves follow the
/// geography's shortest paths between consecutive stops.
pub fn emit<G: Geography + ?Sized>(schedule: &Schedule, ctx: RoutingContext<'_, G>) -> Vec<VehiclePlan> {
    ctx.fleet
        .iter()
        .enumerate()
        .map(|(index, vehicle)| {
            let mut actions = Vec::new();
            let mut distance = 0.0;
            let mut at = vehicle.home;

            for job_id in schedule.chain(index) {
                let job = schedule.job(job_id);
                distance += ctx.geography.distance(at, job.location);
                actions.extend(ctx.geography.path(at, job.location).into_iter().map(Action::Move));
                actions.push(match job.kind {
                    JobKind::Pickup => Action::Pickup(job.task),
                    JobKind::Delivery => Action::Deliver(job.task),
                });
                at = job.location;
            }

            VehiclePlan {
                vehicle: vehicle.id,
                home: vehicle.home,
                actions,
                distance,
            }
        })
        .collect()
}
