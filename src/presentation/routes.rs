// Routers for each pipeline stage
use crate::application::drop_counters::DropCounters;
use crate::presentation::app_state::{AggregatorState, GatewayState};
use crate::presentation::handlers::{
    aggregate, get_invoice, health_check, ingest_socket, metrics,
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// `/healthz` and `/metrics` for a stage that absorbs failures.
pub fn metrics_router(counters: Arc<DropCounters>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/metrics", get(metrics))
        .with_state(counters)
}

pub fn gateway_router(state: Arc<GatewayState>) -> Router {
    let counters = state.ingest.counters().clone();
    Router::new()
        .route("/ws", get(ingest_socket))
        .with_state(state)
        .merge(metrics_router(counters))
        .layer(TraceLayer::new_for_http())
}

pub fn aggregator_router(state: Arc<AggregatorState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/aggregate", post(aggregate))
        .route("/invoice", get(get_invoice))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::invoice_aggregator::InvoiceService;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    fn post_event(json: &str) -> Request<Body> {
        Request::post("/aggregate")
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    fn invoice(obu: &str) -> Request<Body> {
        Request::get(format!("/invoice?obu={}", obu))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_invoice_not_found() {
        let router = aggregator_router(AggregatorState::new(Arc::new(InvoiceService::new(3.15))));

        let (status, body) = send(router, invoice("42")).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "no invoice recorded for obu 42");
    }

    #[tokio::test]
    async fn test_aggregate_then_query() {
        let router = aggregator_router(AggregatorState::new(Arc::new(InvoiceService::new(2.0))));

        for value in [0.0, 3.0, 4.0] {
            let body = format!(r#"{{"value": {}, "unix": 1, "obu_id": 42}}"#, value);
            let (status, _) = send(router.clone(), post_event(&body)).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(router, invoice("42")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["obu_id"], 42);
        assert_eq!(body["total_distance"], 7.0);
        assert_eq!(body["total_amount"], 14.0);
    }

    #[tokio::test]
    async fn test_aggregate_rejects_negative_increment() {
        let router = aggregator_router(AggregatorState::new(Arc::new(InvoiceService::new(1.0))));

        let (status, _) = send(
            router.clone(),
            post_event(r#"{"value": -1.0, "unix": 1, "obu_id": 1}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(router, invoice("1")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_aggregate_rejects_malformed_body() {
        let router = aggregator_router(AggregatorState::new(Arc::new(InvoiceService::new(1.0))));

        let (status, _) = send(router, post_event(r#"{"value": "far"}"#)).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_metrics_reports_counters() {
        let counters = Arc::new(DropCounters::new());
        counters.record_received();
        counters.record_decode_drop();

        let request = Request::get("/metrics").body(Body::empty()).unwrap();
        let (status, body) = send(metrics_router(counters), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["received"], 1);
        assert_eq!(body["decode_dropped"], 1);
        assert_eq!(body["publish_dropped"], 0);
    }
}
