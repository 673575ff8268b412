// Invoice aggregation - accumulates distance per OBU and derives the amount
use crate::domain::distance::DistanceEvent;
use crate::domain::error::InvoiceError;
use crate::domain::invoice::Invoice;
use crate::domain::reading::ObuId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

#[async_trait]
pub trait InvoiceAggregator: Send + Sync {
    /// Add the event's increment to the OBU's running totals and return them.
    async fn record(&self, event: &DistanceEvent) -> Result<Invoice, InvoiceError>;

    /// Current totals for an OBU, or `NotFound` if nothing was recorded for it.
    async fn get_invoice(&self, obu_id: ObuId) -> Result<Invoice, InvoiceError>;
}

/// Process-wide in-memory invoice store.
///
/// Each update runs under the shard lock of its obu_id, so concurrent
/// `record` calls for the same OBU cannot lose an increment.
#[derive(Clone)]
pub struct InvoiceService {
    invoices: Arc<DashMap<ObuId, Invoice>>,
    rate: f64,
}

impl InvoiceService {
    pub fn new(rate: f64) -> Self {
        Self {
            invoices: Arc::new(DashMap::new()),
            rate,
        }
    }
}

#[async_trait]
impl InvoiceAggregator for InvoiceService {
    async fn record(&self, event: &DistanceEvent) -> Result<Invoice, InvoiceError> {
        let increment = event.distance_increment;
        if !increment.is_finite() || increment < 0.0 {
            return Err(InvoiceError::InvalidIncrement(increment));
        }

        let mut invoice = self
            .invoices
            .entry(event.obu_id)
            .or_insert_with(|| Invoice::new(event.obu_id));
        invoice.accumulate(increment, self.rate);
        Ok(*invoice)
    }

    async fn get_invoice(&self, obu_id: ObuId) -> Result<Invoice, InvoiceError> {
        self.invoices
            .get(&obu_id)
            .map(|invoice| *invoice)
            .ok_or(InvoiceError::NotFound(obu_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(obu_id: ObuId, increment: f64) -> DistanceEvent {
        DistanceEvent::new(obu_id, increment, 1)
    }

    #[tokio::test]
    async fn test_unknown_obu_is_not_found() {
        let service = InvoiceService::new(3.15);
        assert_eq!(
            service.get_invoice(99).await,
            Err(InvoiceError::NotFound(99))
        );
    }

    #[tokio::test]
    async fn test_totals_accumulate_and_amount_tracks_rate() {
        let service = InvoiceService::new(2.5);

        for increment in [0.0, 3.0, 4.0] {
            let invoice = service.record(&event(42, increment)).await.unwrap();
            assert_eq!(invoice.total_amount, invoice.total_distance * 2.5);
        }

        let invoice = service.get_invoice(42).await.unwrap();
        assert_eq!(invoice.obu_id, 42);
        assert_eq!(invoice.total_distance, 7.0);
        assert_eq!(invoice.total_amount, 17.5);
    }

    #[tokio::test]
    async fn test_zero_increment_creates_invoice() {
        let service = InvoiceService::new(3.15);
        service.record(&event(1, 0.0)).await.unwrap();

        let invoice = service.get_invoice(1).await.unwrap();
        assert_eq!(invoice.total_distance, 0.0);
        assert_eq!(invoice.total_amount, 0.0);
    }

    #[tokio::test]
    async fn test_replay_yields_same_total() {
        let increments = [1.25, 0.5, 2.0, 0.0, 3.75];

        let first = InvoiceService::new(1.0);
        let second = InvoiceService::new(1.0);
        for increment in increments {
            first.record(&event(7, increment)).await.unwrap();
            second.record(&event(7, increment)).await.unwrap();
        }

        let expected: f64 = increments.iter().sum();
        assert_eq!(first.get_invoice(7).await.unwrap().total_distance, expected);
        assert_eq!(
            first.get_invoice(7).await.unwrap(),
            second.get_invoice(7).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_rejects_negative_and_non_finite_increments() {
        let service = InvoiceService::new(1.0);

        assert_eq!(
            service.record(&event(3, -1.0)).await,
            Err(InvoiceError::InvalidIncrement(-1.0))
        );
        assert!(service.record(&event(3, f64::NAN)).await.is_err());
        assert!(service.record(&event(3, f64::INFINITY)).await.is_err());
        assert_eq!(service.get_invoice(3).await, Err(InvoiceError::NotFound(3)));
    }

    #[tokio::test]
    async fn test_concurrent_records_for_same_obu_are_not_lost() {
        let service = InvoiceService::new(1.0);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    service.record(&event(11, 1.0)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let invoice = service.get_invoice(11).await.unwrap();
        assert_eq!(invoice.total_distance, 800.0);
        assert_eq!(invoice.total_amount, 800.0);
    }
}
