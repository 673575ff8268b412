// Stream processor - broker payloads in, relayed distance events out
use crate::application::distance_calculator::DistanceCalculator;
use crate::application::distance_relay::DistanceRelay;
use crate::application::drop_counters::DropCounters;
use crate::domain::distance::DistanceEvent;
use crate::domain::error::{DecodeError, RelayError};
use crate::domain::reading::ObuReading;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Clone)]
pub struct StreamProcessor {
    calculator: Arc<dyn DistanceCalculator>,
    relay: Arc<dyn DistanceRelay>,
    counters: Arc<DropCounters>,
    relay_timeout: Duration,
}

impl StreamProcessor {
    pub fn new(
        calculator: Arc<dyn DistanceCalculator>,
        relay: Arc<dyn DistanceRelay>,
        counters: Arc<DropCounters>,
        relay_timeout: Duration,
    ) -> Self {
        Self {
            calculator,
            relay,
            counters,
            relay_timeout,
        }
    }

    pub fn counters(&self) -> &Arc<DropCounters> {
        &self.counters
    }

    /// Handle one broker message value. Returns the computed event, or `None`
    /// if the payload could not be decoded.
    pub async fn handle_payload(&self, payload: &[u8]) -> Option<DistanceEvent> {
        self.counters.record_received();
        match decode_reading(payload) {
            Ok(reading) => Some(self.process(&reading).await),
            Err(e) => {
                self.counters.record_decode_drop();
                warn!(error = %e, "dropping undecodable broker message");
                None
            }
        }
    }

    /// Compute the distance event for a reading and relay it once.
    ///
    /// A failed or timed-out relay is logged and the event is dropped; the
    /// computed event is returned either way.
    pub async fn process(&self, reading: &ObuReading) -> DistanceEvent {
        let event = self.calculator.calculate_distance(reading).await;

        match self.relay(&event).await {
            Ok(()) => self.counters.record_forwarded(),
            Err(e) => {
                self.counters.record_relay_drop();
                warn!(obu_id = event.obu_id, error = %e, "dropping distance event after relay failure");
            }
        }

        event
    }

    /// Process payloads in arrival order until the stream ends.
    pub async fn run<S>(&self, mut payloads: S)
    where
        S: Stream<Item = bytes::Bytes> + Unpin,
    {
        info!("distance stream processor started");
        while let Some(payload) = payloads.next().await {
            self.handle_payload(&payload).await;
        }
        info!("distance stream processor stopped");
    }

    async fn relay(&self, event: &DistanceEvent) -> Result<(), RelayError> {
        tokio::time::timeout(self.relay_timeout, self.relay.relay(event))
            .await
            .map_err(|_| RelayError::Timeout(self.relay_timeout))?
    }
}

pub fn decode_reading(payload: &[u8]) -> Result<ObuReading, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::distance_calculator::DistanceService;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingRelay {
        delivered: Mutex<Vec<DistanceEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl DistanceRelay for RecordingRelay {
        async fn relay(&self, event: &DistanceEvent) -> Result<(), RelayError> {
            if self.fail {
                return Err(RelayError::Status(500));
            }
            self.delivered.lock().unwrap().push(*event);
            Ok(())
        }
    }

    struct StalledRelay;

    #[async_trait]
    impl DistanceRelay for StalledRelay {
        async fn relay(&self, _event: &DistanceEvent) -> Result<(), RelayError> {
            futures::future::pending().await
        }
    }

    fn processor(relay: Arc<dyn DistanceRelay>) -> StreamProcessor {
        StreamProcessor::new(
            Arc::new(DistanceService::new()),
            relay,
            Arc::new(DropCounters::new()),
            Duration::from_millis(50),
        )
    }

    fn payload(obu_id: i64, lat: f64, long: f64) -> Bytes {
        Bytes::from(serde_json::to_vec(&ObuReading::new(obu_id, lat, long)).unwrap())
    }

    #[tokio::test]
    async fn test_relays_increments_in_order() {
        let relay = Arc::new(RecordingRelay::default());
        let processor = processor(relay.clone());

        let payloads = futures::stream::iter(vec![
            payload(42, 10.0, 10.0),
            payload(42, 10.0, 13.0),
            payload(42, 14.0, 13.0),
        ]);
        processor.run(payloads).await;

        let delivered = relay.delivered.lock().unwrap();
        let increments: Vec<f64> = delivered.iter().map(|e| e.distance_increment).collect();
        assert_eq!(increments, vec![0.0, 3.0, 4.0]);
        assert!(delivered.iter().all(|e| e.obu_id == 42));
        assert_eq!(processor.counters().snapshot().forwarded, 3);
    }

    #[tokio::test]
    async fn test_undecodable_payload_is_dropped() {
        let relay = Arc::new(RecordingRelay::default());
        let processor = processor(relay.clone());

        assert!(processor.handle_payload(b"garbage").await.is_none());
        let event = processor.handle_payload(&payload(1, 0.0, 0.0)).await;

        assert_eq!(event.map(|e| e.distance_increment), Some(0.0));
        let snapshot = processor.counters().snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.decode_dropped, 1);
        assert_eq!(relay.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_relay_failure_is_absorbed() {
        let processor = processor(Arc::new(RecordingRelay {
            fail: true,
            ..Default::default()
        }));

        processor.process(&ObuReading::new(3, 0.0, 0.0)).await;
        let event = processor.process(&ObuReading::new(3, 3.0, 4.0)).await;

        assert_eq!(event.distance_increment, 5.0);
        let snapshot = processor.counters().snapshot();
        assert_eq!(snapshot.relay_dropped, 2);
        assert_eq!(snapshot.forwarded, 0);
    }

    #[tokio::test]
    async fn test_relay_timeout_is_absorbed() {
        let processor = processor(Arc::new(StalledRelay));

        processor.process(&ObuReading::new(9, 1.0, 1.0)).await;

        assert_eq!(processor.counters().snapshot().relay_dropped, 1);
    }
}
