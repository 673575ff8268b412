// Instrumentation decorator shared by every pipeline stage
//
// `Instrumented<S>` implements each stage contract by delegating to `S` and
// logging the elapsed time, the outcome and any result fields of the call.
// Arguments, return values and errors pass through unchanged.
use crate::application::distance_calculator::DistanceCalculator;
use crate::application::distance_relay::DistanceRelay;
use crate::application::invoice_aggregator::InvoiceAggregator;
use crate::application::reading_publisher::ReadingPublisher;
use crate::domain::distance::DistanceEvent;
use crate::domain::error::{InvoiceError, PublishError, RelayError};
use crate::domain::invoice::Invoice;
use crate::domain::reading::{ObuId, ObuReading};
use async_trait::async_trait;
use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::time::Instant;
use tracing::field::Empty;
use tracing::{Instrument, Span, info, info_span, warn};

#[derive(Debug, Clone)]
pub struct Instrumented<S> {
    inner: S,
    stage: &'static str,
}

impl<S> Instrumented<S> {
    pub fn new(stage: &'static str, inner: S) -> Self {
        Self { inner, stage }
    }

    /// Run `call` inside `span`, then log its duration and outcome.
    ///
    /// `record` fills the span's result fields from a successful value before
    /// the completion event is emitted.
    async fn observe<T, E, F>(
        &self,
        span: Span,
        call: F,
        record: impl FnOnce(&Span, &T),
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: Display,
    {
        let start = Instant::now();
        let result = call.instrument(span.clone()).await;
        let took_us = start.elapsed().as_micros() as u64;

        span.in_scope(|| match &result {
            Ok(value) => {
                record(&span, value);
                info!(stage = self.stage, took_us, "call completed");
            }
            Err(e) => {
                warn!(stage = self.stage, took_us, error = %e, "call failed");
            }
        });

        result
    }
}

#[async_trait]
impl<S: ReadingPublisher> ReadingPublisher for Instrumented<S> {
    async fn publish(&self, reading: &ObuReading) -> Result<(), PublishError> {
        let span = info_span!(
            "publish",
            obu_id = reading.obu_id,
            lat = reading.latitude,
            long = reading.longitude
        );
        self.observe(span, self.inner.publish(reading), |_, _| {})
            .await
    }
}

#[async_trait]
impl<S: DistanceCalculator> DistanceCalculator for Instrumented<S> {
    async fn calculate_distance(&self, reading: &ObuReading) -> DistanceEvent {
        let span = info_span!("calculate_distance", obu_id = reading.obu_id, distance = Empty);
        let call = async { Ok::<_, Infallible>(self.inner.calculate_distance(reading).await) };
        match self
            .observe(span, call, |span, event| {
                span.record("distance", event.distance_increment);
            })
            .await
        {
            Ok(event) => event,
            Err(never) => match never {},
        }
    }
}

#[async_trait]
impl<S: DistanceRelay> DistanceRelay for Instrumented<S> {
    async fn relay(&self, event: &DistanceEvent) -> Result<(), RelayError> {
        let span = info_span!(
            "relay",
            obu_id = event.obu_id,
            distance = event.distance_increment,
            unix = event.captured_at
        );
        self.observe(span, self.inner.relay(event), |_, _| {}).await
    }
}

#[async_trait]
impl<S: InvoiceAggregator> InvoiceAggregator for Instrumented<S> {
    async fn record(&self, event: &DistanceEvent) -> Result<Invoice, InvoiceError> {
        let span = info_span!(
            "record",
            obu_id = event.obu_id,
            distance = event.distance_increment,
            total_distance = Empty,
            total_amount = Empty
        );
        self.observe(span, self.inner.record(event), record_totals)
            .await
    }

    async fn get_invoice(&self, obu_id: ObuId) -> Result<Invoice, InvoiceError> {
        let span = info_span!(
            "get_invoice",
            obu_id,
            total_distance = Empty,
            total_amount = Empty
        );
        self.observe(span, self.inner.get_invoice(obu_id), record_totals)
            .await
    }
}

fn record_totals(span: &Span, invoice: &Invoice) {
    span.record("total_distance", invoice.total_distance);
    span.record("total_amount", invoice.total_amount);
}
