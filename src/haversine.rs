//! Haversine distance matrix provider (fallback when OSRM unavailable).
//!
//! Uses great-circle distance between points. Less accurate than OSRM
//! (ignores roads) but always available.

use crate::traits::DistanceMatrixProvider;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Default detour factor applied to straight-line distances.
const DEFAULT_DETOUR_FACTOR: f64 = 1.0;

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone)]
pub struct HaversineMatrix {
    /// Multiplier approximating how much longer roads are than the
    /// straight line.
    pub detour_factor: f64,
}

impl Default for HaversineMatrix {
    fn default() -> Self {
        Self {
            detour_factor: DEFAULT_DETOUR_FACTOR,
        }
    }
}

impl HaversineMatrix {
    pub fn new(detour_factor: f64) -> Self {
        Self { detour_factor }
    }

    /// Calculate haversine distance between two points in kilometers.
    pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
        let (lat1, lng1) = from;
        let (lat2, lng2) = to;

        let lat1_rad = lat1.to_radians();
        let lat2_rad = lat2.to_radians();
        let delta_lat = (lat2 - lat1).to_radians();
        let delta_lng = (lng2 - lng1).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();

        EARTH_RADIUS_KM * c
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, points: &[(f64, f64)]) -> crate::Result<Vec<Vec<f64>>> {
        let n = points.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for (i, from) in points.iter().enumerate() {
            for (j, to) in points.iter().enumerate() {
                if i != j {
                    matrix[i][j] = Self::haversine_km(*from, *to) * self.detour_factor;
                }
            }
        }

        Ok(matrix)
    }
}
