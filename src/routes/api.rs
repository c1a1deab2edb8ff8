use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{checkin, report};
use crate::state::AppState;
use std::sync::Arc;

/// Create the REST API router
///
/// `POST /checkin` only accepts POST; other methods get 405 from the router.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/checkin", post(checkin::submit_checkin))
        .route("/generate-report", post(report::generate_report))
        .route("/reports/{filename}", get(report::download_report))
        .layer(TraceLayer::new_for_http())
}
