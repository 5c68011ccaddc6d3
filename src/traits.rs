//! Core traits the planner consumes.
//!
//! Geography is kept behind a trait so hosts can plug in their own map;
//! the crate ships [`RoadNetwork`](crate::geography::RoadNetwork).

use crate::model::LocationId;

/// Immutable map of the world for one run. Shared across probe threads.
pub trait Geography: Send + Sync {
    fn location_count(&self) -> usize;

    /// Shortest travel distance in kilometres. Infinite when unreachable.
    fn distance(&self, from: LocationId, to: LocationId) -> f64;

    /// Locations directly connected to `location` by a road.
    fn neighbors(&self, location: LocationId) -> Vec<LocationId>;

    /// Cities driven through from `from` to `to`, excluding `from` and
    /// including `to`. Empty when `from == to` or unreachable.
    fn path(&self, from: LocationId, to: LocationId) -> Vec<LocationId>;

    fn locations(&self) -> Vec<LocationId> {
        (0..self.location_count()).map(LocationId).collect()
    }
}

/// Provides a distance matrix (kilometres) for a set of (lat, lng) points.
///
/// The matrix is indexed by the provided point order.
pub trait DistanceMatrixProvider {
    fn matrix_for(&self, points: &[(f64, f64)]) -> crate::Result<Vec<Vec<f64>>>;
}
