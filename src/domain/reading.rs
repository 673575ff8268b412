// OBU position sample domain model
use serde::{Deserialize, Serialize};

/// Identifier of an on-board unit.
pub type ObuId = i64;

/// A single position sample emitted by an on-board unit.
///
/// Serialized as `{"obu_id": .., "lat": .., "long": ..}` both on the inbound
/// WebSocket and as the broker message value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObuReading {
    pub obu_id: ObuId,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "long")]
    pub longitude: f64,
}

impl ObuReading {
    pub fn new(obu_id: ObuId, latitude: f64, longitude: f64) -> Self {
        Self {
            obu_id,
            latitude,
            longitude,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Last known position of an OBU.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Planar Euclidean distance over raw latitude/longitude values.
    ///
    /// This is not a geodesic distance and must stay that way: invoice
    /// amounts are derived from it.
    pub fn planar_distance(&self, other: &Coordinate) -> f64 {
        let d_lat = other.latitude - self.latitude;
        let d_long = other.longitude - self.longitude;
        d_lat.hypot(d_long)
    }
}
