// HTTP relay client for the invoice aggregator
use crate::application::distance_relay::DistanceRelay;
use crate::domain::distance::DistanceEvent;
use crate::domain::error::RelayError;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct AggregatorClient {
    endpoint: String,
    client: reqwest::Client,
}

impl AggregatorClient {
    pub fn new(endpoint: String) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DistanceRelay for AggregatorClient {
    async fn relay(&self, event: &DistanceEvent) -> Result<(), RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(event)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::Status(response.status().as_u16()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::invoice_aggregator::{InvoiceAggregator, InvoiceService};
    use crate::presentation::app_state::AggregatorState;
    use crate::presentation::routes::aggregator_router;
    use std::sync::Arc;

    async fn serve(service: InvoiceService) -> String {
        let state = AggregatorState::new(Arc::new(service));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, aggregator_router(state)).await.unwrap();
        });
        format!("http://{}/aggregate", addr)
    }

    #[tokio::test]
    async fn test_relay_records_on_aggregator() {
        let service = InvoiceService::new(2.0);
        let client = AggregatorClient::new(serve(service.clone()).await);

        client.relay(&DistanceEvent::new(42, 3.0, 1)).await.unwrap();
        client.relay(&DistanceEvent::new(42, 4.0, 2)).await.unwrap();

        let invoice = service.get_invoice(42).await.unwrap();
        assert_eq!(invoice.total_distance, 7.0);
        assert_eq!(invoice.total_amount, 14.0);
    }

    #[tokio::test]
    async fn test_non_success_status_is_relay_error() {
        let base = serve(InvoiceService::new(1.0)).await;
        let client = AggregatorClient::new(base.replace("/aggregate", "/missing"));

        let err = client.relay(&DistanceEvent::new(1, 1.0, 1)).await.unwrap_err();
        assert!(matches!(err, RelayError::Status(404)));
    }

    #[tokio::test]
    async fn test_unreachable_aggregator_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = AggregatorClient::new(format!("http://{}/aggregate", addr));
        let err = client.relay(&DistanceEvent::new(1, 1.0, 1)).await.unwrap_err();
        assert!(matches!(err, RelayError::Transport(_)));
    }
}
