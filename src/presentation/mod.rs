// Presentation layer - HTTP and WebSocket surfaces of each stage
pub mod app_state;
pub mod handlers;
pub mod routes;
