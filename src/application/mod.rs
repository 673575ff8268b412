// Application layer - Pipeline stages and their service contracts
pub mod distance_calculator;
pub mod distance_relay;
pub mod drop_counters;
pub mod ingest_service;
pub mod instrumentation;
pub mod invoice_aggregator;
pub mod reading_publisher;
pub mod stream_processor;
