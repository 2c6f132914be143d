// =============================================================================
// WebSocket Handler — Live event stream
// =============================================================================
//
// Clients connect to `/api/v1/ws` (plus `?token=<token>` when a subscriber
// token is configured) and receive every EngineEvent broadcast after they
// attach, one JSON text frame per event:
//
//   {"type": "tick",   "data": {"symbol": ..., "price": ..., "timestamp": ...}}
//   {"type": "signal", "data": {"id": ..., "type": ..., "direction": ..., ...}}
//
// A client that falls behind the broadcast buffer skips the missed events and
// carries on from the newest ones. The handler also answers Ping frames and
// exits on Close.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{Sink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::api::auth::validate_token;
use crate::app_state::AppState;
use crate::types::EngineEvent;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Axum handler for the WebSocket upgrade request.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> impl IntoResponse {
    let expected = state.runtime_config.read().subscriber_token.clone();
    if !validate_token(expected.as_deref(), query.token.as_deref()) {
        warn!("WebSocket connection rejected: invalid token");
        return (
            axum::http::StatusCode::FORBIDDEN,
            "Invalid or missing token",
        )
            .into_response();
    }

    info!("WebSocket subscriber accepted — upgrading");
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
        .into_response()
}

/// Forward broadcast events to one subscriber until either side goes away.
async fn handle_ws_connection(socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.emitter.subscribe();
    let (mut sender, mut receiver) = socket.split();
    let mut sent: u64 = 0;

    info!(subscribers = state.emitter.subscriber_count(), "WebSocket subscriber attached");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(e) = send_event(&mut sender, &event).await {
                        debug!(error = %e, "WebSocket send failed — disconnecting");
                        break;
                    }
                    sent += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "WebSocket subscriber lagging — events skipped");
                }
                Err(RecvError::Closed) => {
                    info!("event channel closed — disconnecting subscriber");
                    break;
                }
            },

            msg = receiver.next() => match msg {
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sender.send(Message::Pong(data)).await {
                        debug!(error = %e, "Failed to send Pong — disconnecting");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("WebSocket Close frame received — disconnecting");
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    debug!(msg = %text, "WebSocket client text ignored");
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(error = %e, "WebSocket receive error — disconnecting");
                    break;
                }
                None => break,
            },
        }
    }

    info!(sent, "WebSocket subscriber detached");
}

async fn send_event<S>(sender: &mut S, event: &EngineEvent) -> Result<(), axum::Error>
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    match serde_json::to_string(event) {
        Ok(json) => sender.send(Message::Text(json)).await,
        Err(e) => {
            // Not a transport failure; keep the connection.
            warn!(error = %e, kind = event.event_type(), "Failed to serialize event");
            Ok(())
        }
    }
}
