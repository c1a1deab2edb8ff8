//! `GET /ws/call`: the clinician's overlay relay during a video call.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tracing::info;

use crate::core::session::CallOrchestrator;
use crate::state::AppState;

use super::messages::CallClientMessage;
use super::relay::{MAX_WS_FRAME_SIZE, MAX_WS_MESSAGE_SIZE, run_relay};

pub async fn ws_call_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    info!("Call WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            run_relay::<CallClientMessage, _, _>(socket, "call", move |commands, events| {
                CallOrchestrator::new(state.options, state.adapters.clone(), events).run(commands)
            })
            .await
        })
}
