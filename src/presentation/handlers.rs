// HTTP and WebSocket request handlers
use crate::application::drop_counters::{DropCounters, DropSnapshot};
use crate::application::ingest_service::Frame;
use crate::application::invoice_aggregator::InvoiceAggregator;
use crate::domain::distance::DistanceEvent;
use crate::domain::error::InvoiceError;
use crate::domain::invoice::Invoice;
use crate::domain::reading::ObuId;
use crate::presentation::app_state::{AggregatorState, GatewayState};
use axum::{
    Json,
    extract::{
        Query, State,
        ws::{Message, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Deserialize)]
pub struct InvoiceQuery {
    pub obu: ObuId,
}

impl IntoResponse for InvoiceError {
    fn into_response(self) -> Response {
        let status = match self {
            InvoiceError::NotFound(_) => StatusCode::NOT_FOUND,
            InvoiceError::InvalidIncrement(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Drop counters of the stage serving this router
pub async fn metrics(State(counters): State<Arc<DropCounters>>) -> Json<DropSnapshot> {
    Json(counters.snapshot())
}

/// Upgrade an OBU connection and run its receive loop until it closes
pub async fn ingest_socket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        let frames = Box::pin(socket.map(|message| message.map(frame_from_message)));
        state.ingest.run_connection(frames).await;
    })
}

fn frame_from_message(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text),
        Message::Binary(bytes) => Frame::Binary(bytes),
        Message::Ping(_) | Message::Pong(_) => Frame::Control,
        Message::Close(_) => Frame::Close,
    }
}

/// Record one relayed distance event
pub async fn aggregate(
    State(state): State<Arc<AggregatorState>>,
    Json(event): Json<DistanceEvent>,
) -> Result<Json<Invoice>, InvoiceError> {
    let invoice = state.aggregator.record(&event).await?;
    Ok(Json(invoice))
}

/// Current invoice for `?obu=<id>`
pub async fn get_invoice(
    State(state): State<Arc<AggregatorState>>,
    Query(query): Query<InvoiceQuery>,
) -> Result<Json<Invoice>, InvoiceError> {
    let invoice = state.aggregator.get_invoice(query.obu).await?;
    Ok(Json(invoice))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_mapping() {
        assert_eq!(
            frame_from_message(Message::Text("{}".to_string())),
            Frame::Text("{}".to_string())
        );
        assert_eq!(
            frame_from_message(Message::Binary(vec![1, 2])),
            Frame::Binary(vec![1, 2])
        );
        assert_eq!(frame_from_message(Message::Ping(vec![])), Frame::Control);
        assert_eq!(frame_from_message(Message::Close(None)), Frame::Close);
    }
}
