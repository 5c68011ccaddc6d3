//! Turns marginal costs into a bid.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BidStrategy {
    /// Minimum profit over our own marginal cost.
    pub min_margin: f64,
    /// Fraction of the rival estimate we bid when undercutting.
    pub undercut: f64,
    /// Never bid below this.
    pub min_bid: u64,
}

impl Default for BidStrategy {
    fn default() -> Self {
        Self {
            min_margin: 0.1,
            undercut: 0.95,
            min_bid: 1,
        }
    }
}

impl BidStrategy {
    /// Our floor, raised to just under the rival's estimate when that is
    /// higher. A negative marginal cost counts as zero.
    pub fn bid(&self, own_marginal: f64, opponent_estimate: Option<f64>) -> u64 {
        let floor = (own_marginal.max(0.0) * (1.0 + self.min_margin)).max(self.min_bid as f64);
        let price = match opponent_estimate {
            Some(estimate) if estimate.is_finite() => floor.max(estimate * self.undercut),
            _ => floor,
        };
        price.ceil() as u64
    }
}
