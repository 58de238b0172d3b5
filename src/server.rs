//! HTTP and WebSocket front end.
//!
//! Each socket is one connection actor: a reader loop feeding the
//! coordinator in arrival order, and a writer task draining the
//! connection's outbound queue.

use crate::gateway::{Broadcaster, ConnectionRegistry, Transport};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::ConnectionId;
use crate::session::SessionCoordinator;
use crate::store::RoomStore;
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

/// Shared handles every request needs.
#[derive(Debug, Clone)]
pub struct AppState {
    coordinator: Arc<SessionCoordinator>,
    registry: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Wires a fresh store, registry and coordinator together.
    #[instrument]
    pub fn new() -> Self {
        let store = Arc::new(RoomStore::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let coordinator = Arc::new(SessionCoordinator::new(store, broadcaster));
        Self {
            coordinator,
            registry,
        }
    }

    /// Returns the coordinator.
    pub fn coordinator(&self) -> &Arc<SessionCoordinator> {
        &self.coordinator
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the router: `/ws` for game traffic, `/health` for probes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.coordinator.store().stats();
    Json(json!({
        "status": "ok",
        "rooms": stats.rooms,
        "connections": stats.connections,
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let id = ConnectionId::new();
        run_connection(socket, id, state).instrument(info_span!("connection", %id))
    })
}

async fn run_connection(socket: WebSocket, id: ConnectionId, state: AppState) {
    info!("Client connected");
    let mut outbound = state.registry.connect(id);
    state.coordinator.connect(id);

    let (mut sink, mut stream) = socket.split();

    let writer = tokio::spawn(
        async move {
            while let Some(message) = outbound.recv().await {
                let text = match message.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        error!(error = %e, "Failed to encode message");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    debug!("Socket closed while sending");
                    break;
                }
            }
            let _ = sink.close().await;
        }
        .in_current_span(),
    );

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match ClientMessage::parse(text.as_str()) {
                Ok(message) => state.coordinator.handle(id, message),
                Err(e) => {
                    warn!(error = %e, "Rejected client message");
                    state.registry.send(id, ServerMessage::error(e.message));
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client sent close frame");
                break;
            }
            Err(e) => {
                warn!(error = %e, "WebSocket error");
                break;
            }
            _ => {
                // Binary, ping and pong frames carry no game traffic.
            }
        }
    }

    // Close is handled after the last message from this connection.
    state.coordinator.disconnect(id);
    state.registry.disconnect(id);
    if let Err(e) = writer.await {
        warn!(error = %e, "Writer task failed");
    }
    info!("Client disconnected");
}

/// Binds `addr` and serves until the process exits.
#[instrument]
pub async fn serve(addr: String) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "Room server listening");
    axum::serve(listener, router(AppState::new())).await?;
    Ok(())
}
