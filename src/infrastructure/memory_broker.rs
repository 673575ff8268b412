// In-process broker used when all stages share one process
use crate::application::reading_publisher::ReadingPublisher;
use crate::domain::error::PublishError;
use crate::domain::reading::ObuReading;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Single ordered channel standing in for the broker topic.
///
/// Messages carry the same JSON value a NATS message would, so the consumer
/// side runs through the same decode path.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    tx: mpsc::Sender<Bytes>,
}

impl MemoryBroker {
    /// Create the broker and the stream its consumer reads from.
    pub fn channel(capacity: usize) -> (Self, ReceiverStream<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, ReceiverStream::new(rx))
    }
}

#[async_trait]
impl ReadingPublisher for MemoryBroker {
    async fn publish(&self, reading: &ObuReading) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(reading)?;
        self.tx
            .send(Bytes::from(payload))
            .await
            .map_err(|_| PublishError::Closed)
    }
}
