// Domain layer - Telemetry, distance and invoice models
pub mod distance;
pub mod error;
pub mod invoice;
pub mod reading;
