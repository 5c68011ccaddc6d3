//! Road network geography with precomputed all-pairs shortest paths.

use crate::error::{PlannerError, Result};
use crate::model::LocationId;
use crate::traits::{DistanceMatrixProvider, Geography};

/// A graph of named cities joined by bidirectional roads.
///
/// Distances and next hops are computed once at construction, so `distance`
/// is a table lookup during search.
#[derive(Debug, Clone)]
pub struct RoadNetwork {
    names: Vec<String>,
    adjacency: Vec<Vec<LocationId>>,
    distances: Vec<f64>,
    next_hop: Vec<Option<usize>>,
}

impl RoadNetwork {
    /// Build from explicit roads `(from, to, length_km)`.
    pub fn new(names: Vec<String>, roads: &[(usize, usize, f64)]) -> Result<Self> {
        let n = names.len();
        let mut network = Self {
            names,
            adjacency: vec![Vec::new(); n],
            distances: vec![f64::INFINITY; n * n],
            next_hop: vec![None; n * n],
        };

        for i in 0..n {
            network.distances[i * n + i] = 0.0;
            network.next_hop[i * n + i] = Some(i);
        }

        for &(from, to, length) in roads {
            network.add_road(from, to, length)?;
        }

        network.close_paths();
        Ok(network)
    }

    /// Build from a full distance matrix, linking every city to its
    /// `links_per_city` nearest cities.
    pub fn from_matrix(
        names: Vec<String>,
        matrix: &[Vec<f64>],
        links_per_city: usize,
    ) -> Result<Self> {
        let n = names.len();
        if matrix.len() != n {
            return Err(PlannerError::UnknownLocation(LocationId(matrix.len().min(n))));
        }

        let mut roads = Vec::new();
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                return Err(PlannerError::UnknownLocation(LocationId(i)));
            }
            let mut nearest: Vec<usize> = (0..n)
                .filter(|&j| j != i && row[j].is_finite())
                .collect();
            nearest.sort_by(|&a, &b| row[a].total_cmp(&row[b]));
            for j in nearest.into_iter().take(links_per_city) {
                roads.push((i, j, row[j]));
            }
        }

        Self::new(names, &roads)
    }

    /// Build from coordinates, asking `provider` for the distance matrix.
    pub fn from_points<P: DistanceMatrixProvider + ?Sized>(
        names: Vec<String>,
        points: &[(f64, f64)],
        provider: &P,
        links_per_city: usize,
    ) -> Result<Self> {
        let matrix = provider.matrix_for(points)?;
        Self::from_matrix(names, &matrix, links_per_city)
    }

    pub fn name(&self, location: LocationId) -> Option<&str> {
        self.names.get(location.0).map(String::as_str)
    }

    pub fn find(&self, name: &str) -> Option<LocationId> {
        self.names.iter().position(|n| n == name).map(LocationId)
    }

    fn add_road(&mut self, from: usize, to: usize, length: f64) -> Result<()> {
        let n = self.names.len();
        if from >= n {
            return Err(PlannerError::UnknownLocation(LocationId(from)));
        }
        if to >= n {
            return Err(PlannerError::UnknownLocation(LocationId(to)));
        }
        if !length.is_finite() || length < 0.0 {
            return Err(PlannerError::InvalidRoad {
                from: LocationId(from),
                to: LocationId(to),
                length,
            });
        }
        if from == to {
            return Ok(());
        }

        for (a, b) in [(from, to), (to, from)] {
            if !self.adjacency[a].contains(&LocationId(b)) {
                self.adjacency[a].push(LocationId(b));
            }
            if length < self.distances[a * n + b] {
                self.distances[a * n + b] = length;
                self.next_hop[a * n + b] = Some(b);
            }
        }
        Ok(())
    }

    /// Floyd–Warshall over the road lengths.
    fn close_paths(&mut self) {
        let n = self.names.len();
        for k in 0..n {
            for i in 0..n {
                let via_k = self.distances[i * n + k];
                if !via_k.is_finite() {
                    continue;
                }
                for j in 0..n {
                    let candidate = via_k + self.distances[k * n + j];
                    if candidate < self.distances[i * n + j] {
                        self.distances[i * n + j] = candidate;
                        self.next_hop[i * n + j] = self.next_hop[i * n + k];
                    }
                }
            }
        }
    }
}

impl Geography for RoadNetwork {
    fn location_count(&self) -> usize {
        self.names.len()
    }

    /// Infinite for ids outside the network.
    fn distance(&self, from: LocationId, to: LocationId) -> f64 {
        let n = self.names.len();
        if from.0 >= n || to.0 >= n {
            return f64::INFINITY;
        }
        self.distances[from.0 * n + to.0]
    }

    fn neighbors(&self, location: LocationId) -> Vec<LocationId> {
        self.adjacency.get(location.0).cloned().unwrap_or_default()
    }

    fn path(&self, from: LocationId, to: LocationId) -> Vec<LocationId> {
        let n = self.names.len();
        if from.0 >= n || to.0 >= n {
            return Vec::new();
        }
        let mut steps = Vec::new();
        let mut current = from.0;
        while current != to.0 {
            match self.next_hop[current * n + to.0] {
                Some(hop) => {
                    steps.push(LocationId(hop));
                    current = hop;
                }
                None => return Vec::new(),
            }
        }
        steps
    }
}
