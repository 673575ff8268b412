// Relay trait for delivering distance events to the aggregator
use crate::domain::distance::DistanceEvent;
use crate::domain::error::RelayError;
use async_trait::async_trait;

#[async_trait]
pub trait DistanceRelay: Send + Sync {
    /// Deliver one event. A failure is final; callers never retry.
    async fn relay(&self, event: &DistanceEvent) -> Result<(), RelayError>;
}
