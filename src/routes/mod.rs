pub mod api;
pub mod ws;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// All routes with state applied, without the outer middleware stack.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", axum::routing::get(crate::handlers::api::health_check))
        .merge(api::create_api_router())
        .merge(ws::create_ws_router())
        .with_state(state)
}
