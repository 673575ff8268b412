// Distance calculation - turns ordered readings into distance events
use crate::domain::distance::DistanceEvent;
use crate::domain::reading::{Coordinate, ObuId, ObuReading};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

#[async_trait]
pub trait DistanceCalculator: Send + Sync {
    /// Compute the distance since the previous reading of the same OBU and
    /// remember this reading as the new previous one.
    async fn calculate_distance(&self, reading: &ObuReading) -> DistanceEvent;
}

/// Keeps the last known coordinate of every OBU seen so far.
///
/// The read-modify-write for one obu_id happens under that key's shard lock,
/// so concurrent consumers never interleave updates for the same OBU. Readings
/// must still arrive in per-OBU order for the increments to be meaningful.
#[derive(Clone, Default)]
pub struct DistanceService {
    last_positions: Arc<DashMap<ObuId, Coordinate>>,
}

impl DistanceService {
    pub fn new() -> Self {
        Self::default()
    }

    fn advance(&self, reading: &ObuReading) -> f64 {
        let next = reading.coordinate();
        match self.last_positions.entry(reading.obu_id) {
            Entry::Vacant(slot) => {
                slot.insert(next);
                0.0
            }
            Entry::Occupied(mut slot) => {
                let increment = slot.get().planar_distance(&next);
                slot.insert(next);
                increment
            }
        }
    }
}

#[async_trait]
impl DistanceCalculator for DistanceService {
    async fn calculate_distance(&self, reading: &ObuReading) -> DistanceEvent {
        let increment = self.advance(reading);
        DistanceEvent::now(reading.obu_id, increment)
    }
}

#[cfg(test)]
impl DistanceService {
    fn tracked_obus(&self) -> usize {
        self.last_positions.len()
    }

    fn last_position(&self, obu_id: ObuId) -> Option<Coordinate> {
        self.last_positions.get(&obu_id).map(|c| *c)
    }
}
