// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` and are read-only:
//
//   GET /api/v1/health    liveness, feed connection state, counters
//   GET /api/v1/signals   last 100 admitted signals, oldest first
//   GET /api/v1/symbols   per-symbol buffer depth, last price, last score
//   GET /api/v1/ws        live event stream (see ws.rs)
//
// CORS is configured permissively; subscribers are typically browser
// dashboards on another origin.
// =============================================================================

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::app_state::{AppState, HealthSnapshot, SymbolSummary};
use crate::types::Signal;

/// Build the API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/signals", get(signals))
        .route("/api/v1/symbols", get(symbols))
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthSnapshot> {
    Json(state.health())
}

async fn signals(State(state): State<Arc<AppState>>) -> Json<Vec<Signal>> {
    Json(state.recent_signals())
}

async fn symbols(State(state): State<Arc<AppState>>) -> Json<Vec<SymbolSummary>> {
    Json(state.symbol_summaries())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market_data::ConnectionState;
    use crate::runtime_config::RuntimeConfig;
    use crate::types::{EngineEvent, SignalType, Tick};
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    fn state_with_token(token: Option<&str>) -> Arc<AppState> {
        let config = RuntimeConfig {
            symbols: vec!["R_100".into()],
            subscriber_token: token.map(str::to_string),
            ..RuntimeConfig::default()
        };
        Arc::new(AppState::new(config).unwrap())
    }

    async fn serve(state: Arc<AppState>) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, router(state)).await;
        });
        addr
    }

    async fn wait_for_subscriber(state: &AppState) {
        for _ in 0..100 {
            if state.emitter.subscriber_count() > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("subscriber never attached");
    }

    #[tokio::test]
    async fn health_reports_counters() {
        let state = state_with_token(None);
        state.ingest_and_publish(Tick::new("R_100", 10000.7, 0));

        let Json(snapshot) = health(State(state)).await;
        assert_eq!(snapshot.status, "ok");
        assert_eq!(snapshot.connection_state, ConnectionState::Disconnected);
        assert_eq!(snapshot.ticks_ingested, 1);
        assert_eq!(snapshot.signals_emitted, 1);
        assert_eq!(snapshot.last_emission, Some(0));
    }

    #[tokio::test]
    async fn signals_lists_admitted_signals() {
        let state = state_with_token(None);
        state.ingest_and_publish(Tick::new("R_100", 10000.7, 0));
        state.ingest_and_publish(Tick::new("R_100", 10002.7, 1_000));

        let Json(list) = signals(State(state)).await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].kind(), SignalType::EvenOdd);
    }

    #[tokio::test]
    async fn websocket_streams_engine_events() {
        let state = state_with_token(None);
        let addr = serve(state.clone()).await;

        let (mut client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws"))
            .await
            .unwrap();
        wait_for_subscriber(&state).await;

        state.ingest_and_publish(Tick::new("R_100", 10000.7, 42_000));

        let mut kinds = Vec::new();
        while kinds.len() < 2 {
            match client.next().await {
                Some(Ok(Message::Text(text))) => {
                    let event: EngineEvent = serde_json::from_str(&text).unwrap();
                    kinds.push(event.event_type());
                }
                Some(Ok(_)) => {}
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(kinds, vec!["tick", "signal"]);
    }

    #[tokio::test]
    async fn websocket_requires_configured_token() {
        let state = state_with_token(Some("s3cret"));
        let addr = serve(state.clone()).await;

        let rejected = tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws")).await;
        assert!(rejected.is_err());

        let accepted =
            tokio_tungstenite::connect_async(format!("ws://{addr}/api/v1/ws?token=s3cret")).await;
        assert!(accepted.is_ok());
    }
}
