// Distance event domain model
use super::reading::ObuId;
use serde::{Deserialize, Serialize};

/// Distance travelled by one OBU between its two most recent samples.
///
/// Wire shape on the aggregator relay is `{"value", "unix", "obu_id"}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceEvent {
    pub obu_id: ObuId,
    #[serde(rename = "value")]
    pub distance_increment: f64,
    /// Capture time in Unix epoch nanoseconds.
    #[serde(rename = "unix")]
    pub captured_at: i64,
}

impl DistanceEvent {
    pub fn new(obu_id: ObuId, distance_increment: f64, captured_at: i64) -> Self {
        Self {
            obu_id,
            distance_increment,
            captured_at,
        }
    }

    /// Build an event stamped with the current wall clock.
    pub fn now(obu_id: ObuId, distance_increment: f64) -> Self {
        let captured_at = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
        Self::new(obu_id, distance_increment, captured_at)
    }
}
