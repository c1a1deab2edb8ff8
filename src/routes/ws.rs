//! Browser WebSocket routes
//!
//! `GET /ws/checkin` runs a patient check-in; `GET /ws/call` runs the
//! clinician overlay for a video call. See [`crate::handlers::ws`] for the
//! message protocol.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::ws::{ws_call_handler, ws_checkin_handler};
use crate::state::AppState;
use std::sync::Arc;

pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/checkin", get(ws_checkin_handler))
        .route("/ws/call", get(ws_call_handler))
        .layer(TraceLayer::new_for_http())
}
