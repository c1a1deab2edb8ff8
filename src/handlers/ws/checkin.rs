//! `GET /ws/checkin`: the patient's check-in relay.

use axum::{
    extract::{State, WebSocketUpgrade},
    response::Response,
};
use std::sync::Arc;
use tracing::info;

use crate::core::session::CheckinOrchestrator;
use crate::state::AppState;

use super::messages::CheckinClientMessage;
use super::relay::{MAX_WS_FRAME_SIZE, MAX_WS_MESSAGE_SIZE, run_relay};

/// Upgrade to a check-in session socket.
///
/// The client sends `start`, `stop` and `frame` messages plus binary audio.
/// The server streams session events until the socket closes. A recording
/// that is still running when the socket closes is finished and submitted.
pub async fn ws_checkin_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Check-in WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| async move {
            run_relay::<CheckinClientMessage, _, _>(socket, "check-in", move |commands, events| {
                let orchestrator = CheckinOrchestrator::new(
                    state.options,
                    state.adapters.clone(),
                    Arc::new(state.repository.clone()),
                    events,
                );
                orchestrator.run(commands)
            })
            .await
        })
}
