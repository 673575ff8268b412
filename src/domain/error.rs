// Pipeline error taxonomy
use super::reading::ObuId;
use std::time::Duration;
use thiserror::Error;

/// A telemetry payload could not be turned into an `ObuReading`.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed telemetry payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Handing a reading to the broker failed.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("broker rejected publish: {0}")]
    Broker(String),

    #[error("broker channel is closed")]
    Closed,

    #[error("publish timed out after {0:?}")]
    Timeout(Duration),
}

/// Delivering a distance event to the aggregator failed.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("aggregator unreachable: {0}")]
    Transport(String),

    #[error("aggregator responded with status {0}")]
    Status(u16),

    #[error("relay timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error, PartialEq)]
pub enum InvoiceError {
    #[error("no invoice recorded for obu {0}")]
    NotFound(ObuId),

    #[error("invalid distance increment {0}")]
    InvalidIncrement(f64),
}
