//! OSRM HTTP adapter for distance matrices.

use serde::Deserialize;
use tracing::warn;

use crate::error::Result;
use crate::traits::DistanceMatrixProvider;

#[derive(Debug, Clone)]
pub struct OsrmConfig {
    pub base_url: String,
    pub profile: String,
    pub timeout_secs: u64,
}

impl Default for OsrmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            profile: "car".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OsrmClient {
    config: OsrmConfig,
    client: reqwest::blocking::Client,
}

impl OsrmClient {
    pub fn new(config: OsrmConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn table_url(&self, points: &[(f64, f64)]) -> String {
        let coords = points
            .iter()
            .map(|(lat, lng)| format!("{:.6},{:.6}", lng, lat))
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{}/table/v1/{}/{}?annotations=distance",
            self.config.base_url, self.config.profile, coords
        )
    }
}

impl DistanceMatrixProvider for OsrmClient {
    fn matrix_for(&self, points: &[(f64, f64)]) -> Result<Vec<Vec<f64>>> {
        if points.is_empty() {
            return Ok(Vec::new());
        }

        let body = self
            .client
            .get(self.table_url(points))
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OsrmTableResponse>())
            .map_err(|err| {
                warn!(error = %err, "OSRM table request failed");
                err
            })?;

        Ok(body.into_kilometres())
    }
}

/// `table` service response. Distances are metres; unroutable pairs are null.
#[derive(Debug, Deserialize)]
pub struct OsrmTableResponse {
    distances: Option<Vec<Vec<Option<f64>>>>,
}

impl OsrmTableResponse {
    pub fn into_kilometres(self) -> Vec<Vec<f64>> {
        self.distances
            .unwrap_or_default()
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|value| value.map_or(f64::INFINITY, |metres| metres / 1000.0))
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_url_uses_lng_lat_order() {
        let client = OsrmClient::new(OsrmConfig::default()).unwrap();
        let url = client.table_url(&[(46.5, 6.6), (46.2, 6.1)]);

        assert_eq!(
            url,
            "http://localhost:5000/table/v1/car/6.600000,46.500000;6.100000,46.200000?annotations=distance"
        );
    }

    #[test]
    fn test_response_converted_to_kilometres() {
        let response: OsrmTableResponse = serde_json::from_str(
            r#"{"code":"Ok","distances":[[0,1500.0],[1600.0,null]]}"#,
        )
        .unwrap();

        let matrix = response.into_kilometres();
        assert_eq!(matrix[0][1], 1.5);
        assert_eq!(matrix[1][0], 1.6);
        assert!(matrix[1][1].is_infinite());
    }

    #[test]
    fn test_empty_points_skip_request() {
        let client = OsrmClient::new(OsrmConfig::default()).unwrap();
        assert!(client.matrix_for(&[]).unwrap().is_empty());
    }
}
