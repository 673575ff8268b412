// Publisher trait for handing readings to the broker
use crate::domain::error::PublishError;
use crate::domain::reading::ObuReading;
use async_trait::async_trait;

#[async_trait]
pub trait ReadingPublisher: Send + Sync {
    /// Publish one reading to the broker, keyed by its obu_id.
    async fn publish(&self, reading: &ObuReading) -> Result<(), PublishError>;
}

#[async_trait]
impl<T: ReadingPublisher + ?Sized> ReadingPublisher for std::sync::Arc<T> {
    async fn publish(&self, reading: &ObuReading) -> Result<(), PublishError> {
        (**self).publish(reading).await
    }
}
