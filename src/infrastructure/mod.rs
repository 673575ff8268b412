// Infrastructure layer - External dependencies and adapters
pub mod aggregator_client;
pub mod config;
pub mod memory_broker;
pub mod nats_broker;
pub mod telemetry;
