// Application state for HTTP handlers
use crate::application::ingest_service::IngestService;
use crate::application::invoice_aggregator::InvoiceAggregator;
use std::sync::Arc;

#[derive(Clone)]
pub struct GatewayState {
    pub ingest: IngestService,
}

#[derive(Clone)]
pub struct AggregatorState {
    pub aggregator: Arc<dyn InvoiceAggregator>,
}

impl GatewayState {
    pub fn new(ingest: IngestService) -> Arc<Self> {
        Arc::new(Self { ingest })
    }
}

impl AggregatorState {
    pub fn new(aggregator: Arc<dyn InvoiceAggregator>) -> Arc<Self> {
        Arc::new(Self { aggregator })
    }
}
