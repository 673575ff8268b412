// NATS JetStream broker - durable, per-OBU ordered transport for readings
use crate::application::reading_publisher::ReadingPublisher;
use crate::domain::error::PublishError;
use crate::domain::reading::{ObuId, ObuReading};
use crate::infrastructure::config::BrokerSettings;
use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, stream::Config as StreamConfig};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct NatsBroker {
    jetstream: jetstream::Context,
    stream: String,
    subject_prefix: String,
}

/// Readings are keyed by obu_id through the subject, so every OBU maps to
/// its own ordered subject inside the stream.
pub fn subject_for(prefix: &str, obu_id: ObuId) -> String {
    format!("{}.{}", prefix, obu_id)
}

impl NatsBroker {
    pub async fn connect(settings: &BrokerSettings) -> Result<Self> {
        info!(url = %settings.url, timeout_ms = settings.connect_timeout_ms, "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(settings.connect_timeout())
            .connect(settings.url.as_str())
            .await
            .context("Failed to connect to NATS")?;

        info!("Successfully connected to NATS");
        Ok(Self {
            jetstream: jetstream::new(client),
            stream: settings.stream.clone(),
            subject_prefix: settings.subject_prefix.clone(),
        })
    }

    pub async fn ensure_stream(&self) -> Result<()> {
        match self.jetstream.get_stream(&self.stream).await {
            Ok(_) => {
                info!(stream = %self.stream, "Stream already exists");
            }
            Err(_) => {
                self.jetstream
                    .create_stream(StreamConfig {
                        name: self.stream.clone(),
                        subjects: vec![format!("{}.*", self.subject_prefix)],
                        description: Some("OBU position readings".to_string()),
                        ..Default::default()
                    })
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %self.stream, "Created stream");
            }
        }

        Ok(())
    }

    /// Durable explicit-ack pull consumer over every OBU subject.
    pub async fn pull_consumer(&self, name: &str, ack_wait: Duration) -> Result<PullConsumer> {
        let stream = self
            .jetstream
            .get_stream(&self.stream)
            .await
            .context("Failed to get stream")?;

        let consumer = stream
            .get_or_create_consumer(
                name,
                jetstream::consumer::pull::Config {
                    durable_name: Some(name.to_string()),
                    filter_subject: format!("{}.*", self.subject_prefix),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ack_wait,
                    ..Default::default()
                },
            )
            .await
            .context("Failed to create consumer")?;

        info!(stream = %self.stream, consumer = name, "Consumer ready");
        Ok(consumer)
    }

    /// Payload stream over a pull consumer, fetched in batches.
    ///
    /// Each batch is settled before any of it is handed out, so no ack waits
    /// on downstream handling and `ack_wait` only has to cover `max_wait`.
    pub fn payloads(
        consumer: PullConsumer,
        batch_size: usize,
        max_wait: Duration,
    ) -> impl Stream<Item = Bytes> + Send {
        async_stream::stream! {
            loop {
                let mut batch = match consumer
                    .fetch()
                    .max_messages(batch_size)
                    .expires(max_wait)
                    .messages()
                    .await
                {
                    Ok(batch) => batch,
                    Err(e) => {
                        error!(error = %e, "Failed to fetch messages");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                let mut messages = Vec::new();
                while let Some(next) = batch.next().await {
                    match next {
                        Ok(message) => messages.push(message),
                        Err(e) => {
                            warn!(error = %e, "Error receiving message from batch");
                        }
                    }
                }

                for payload in settle_batch(messages).await {
                    yield payload;
                }
            }
        }
    }
}

/// A fetched broker message that can be acknowledged.
#[async_trait]
pub trait Delivery: Send + Sync {
    fn payload(&self) -> Bytes;

    /// Whether the broker has handed this message out before.
    fn redelivered(&self) -> bool;

    async fn acknowledge(&self) -> Result<(), String>;
}

#[async_trait]
impl Delivery for jetstream::Message {
    fn payload(&self) -> Bytes {
        self.payload.clone()
    }

    fn redelivered(&self) -> bool {
        self.info().map(|info| info.delivered > 1).unwrap_or(false)
    }

    async fn acknowledge(&self) -> Result<(), String> {
        self.ack().await.map_err(|e| e.to_string())
    }
}

/// Ack every message of a batch, then return the payloads to process.
///
/// Forwarding is at-most-once, so messages are acked on receipt. A
/// redelivered message is acked and skipped: it would reach the calculator
/// after newer readings of the same OBU.
pub async fn settle_batch<M: Delivery>(messages: Vec<M>) -> Vec<Bytes> {
    let mut payloads = Vec::with_capacity(messages.len());
    for message in &messages {
        if let Err(e) = message.acknowledge().await {
            warn!(error = %e, "Failed to acknowledge message");
        }
        if message.redelivered() {
            warn!("Skipping redelivered reading");
            continue;
        }
        payloads.push(message.payload());
    }
    debug!(fetched = messages.len(), forwarded = payloads.len(), "Settled batch");
    payloads
}

#[async_trait]
impl ReadingPublisher for NatsBroker {
    async fn publish(&self, reading: &ObuReading) -> Result<(), PublishError> {
        let payload = Bytes::from(serde_json::to_vec(reading)?);
        let subject = subject_for(&self.subject_prefix, reading.obu_id);

        let ack = self
            .jetstream
            .publish(subject, payload)
            .await
            .map_err(|e| PublishError::Broker(e.to_string()))?;
        ack.await
            .map_err(|e| PublishError::Broker(e.to_string()))?;

        Ok(())
    }
}
