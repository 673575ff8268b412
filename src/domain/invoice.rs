// Invoice domain model
use super::reading::ObuId;
use serde::{Deserialize, Serialize};

/// Accumulated toll charge for one OBU.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub obu_id: ObuId,
    pub total_distance: f64,
    pub total_amount: f64,
}

impl Invoice {
    pub fn new(obu_id: ObuId) -> Self {
        Self {
            obu_id,
            total_distance: 0.0,
            total_amount: 0.0,
        }
    }

    /// Add a distance increment and re-derive the amount from the new total.
    pub fn accumulate(&mut self, increment: f64, rate: f64) {
        self.total_distance += increment;
        self.total_amount = self.total_distance * rate;
    }
}
