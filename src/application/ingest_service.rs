// Ingest service - per-connection receive loop of the gateway
use crate::application::drop_counters::DropCounters;
use crate::application::reading_publisher::ReadingPublisher;
use crate::domain::error::{DecodeError, PublishError};
use crate::domain::reading::ObuReading;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Transport-independent view of one inbound frame on a live connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
    /// Ping/pong and other frames that carry no telemetry.
    Control,
    Close,
}

fn decode_text(text: &str) -> Result<ObuReading, DecodeError> {
    Ok(serde_json::from_str(text)?)
}

fn decode_binary(bytes: &[u8]) -> Result<ObuReading, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// How a connection's receive loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The peer sent a close frame.
    Closed,
    /// The frame stream ended.
    Ended,
    /// Reading from the connection failed.
    Errored,
}

#[derive(Clone)]
pub struct IngestService {
    publisher: Arc<dyn ReadingPublisher>,
    counters: Arc<DropCounters>,
    publish_timeout: Duration,
}

impl IngestService {
    pub fn new(
        publisher: Arc<dyn ReadingPublisher>,
        counters: Arc<DropCounters>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            publisher,
            counters,
            publish_timeout,
        }
    }

    pub fn counters(&self) -> &Arc<DropCounters> {
        &self.counters
    }

    /// Receive loop for one OBU connection.
    ///
    /// Undecodable frames and failed publishes are logged and dropped; the
    /// loop only ends when the connection itself closes or errors.
    pub async fn run_connection<S, E>(&self, mut frames: S) -> Disconnect
    where
        S: Stream<Item = Result<Frame, E>> + Unpin,
        E: Display,
    {
        info!("OBU client connected");

        let disconnect = loop {
            let decoded = match frames.next().await {
                Some(Ok(Frame::Text(text))) => decode_text(&text),
                Some(Ok(Frame::Binary(bytes))) => decode_binary(&bytes),
                Some(Ok(Frame::Control)) => continue,
                Some(Ok(Frame::Close)) => break Disconnect::Closed,
                Some(Err(e)) => {
                    warn!(error = %e, "read error, dropping connection");
                    break Disconnect::Errored;
                }
                None => break Disconnect::Ended,
            };

            self.counters.record_received();
            let reading = match decoded {
                Ok(reading) => reading,
                Err(e) => {
                    self.counters.record_decode_drop();
                    warn!(error = %e, "dropping undecodable telemetry frame");
                    continue;
                }
            };

            match self.publish(&reading).await {
                Ok(()) => self.counters.record_forwarded(),
                Err(e) => {
                    self.counters.record_publish_drop();
                    warn!(obu_id = reading.obu_id, error = %e, "dropping reading after publish failure");
                }
            }
        };

        debug!(?disconnect, "OBU client disconnected");
        disconnect
    }

    async fn publish(&self, reading: &ObuReading) -> Result<(), PublishError> {
        tokio::time::timeout(self.publish_timeout, self.publisher.publish(reading))
            .await
            .map_err(|_| PublishError::Timeout(self.publish_timeout))?
    }
}
