//! Error type shared by the planner, the geography adapters and the agent.

use std::fmt;

use crate::model::{LocationId, TaskId};

pub type Result<T> = std::result::Result<T, PlannerError>;

#[derive(Debug)]
pub enum PlannerError {
    /// No vehicle can carry the task on its own.
    InfeasibleTask {
        task: TaskId,
        weight: u32,
        max_capacity: u32,
    },
    UnknownLocation(LocationId),
    InvalidRoad {
        from: LocationId,
        to: LocationId,
        length: f64,
    },
    /// `confirm` was called without a preceding probe.
    NothingToConfirm,
    EmptyFleet,
    Osrm(reqwest::Error),
}

impl PlannerError {
    /// True when the failure means "this fleet cannot serve the task",
    /// as opposed to a configuration or transport problem.
    pub fn is_infeasible(&self) -> bool {
        matches!(self, PlannerError::InfeasibleTask { .. })
    }
}

impl fmt::Display for PlannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerError::InfeasibleTask {
                task,
                weight,
                max_capacity,
            } => write!(
                f,
                "no vehicle can carry task {} (weight {}, largest capacity {})",
                task.0, weight, max_capacity
            ),
            PlannerError::UnknownLocation(location) => {
                write!(f, "location {} is not part of the geography", location.0)
            }
            PlannerError::InvalidRoad { from, to, length } => write!(
                f,
                "invalid road {} -> {} with length {}",
                from.0, to.0, length
            ),
            PlannerError::NothingToConfirm => write!(f, "no speculative schedule to confirm"),
            PlannerError::EmptyFleet => write!(f, "fleet has no vehicles"),
            PlannerError::Osrm(err) => write!(f, "OSRM request failed: {}", err),
        }
    }
}

impl std::error::Error for PlannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlannerError::Osrm(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PlannerError {
    fn from(err: reqwest::Error) -> Self {
        PlannerError::Osrm(err)
    }
}
