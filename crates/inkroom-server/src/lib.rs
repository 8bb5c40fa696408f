//! InkRoom WebSocket Relay Server
//!
//! Clients join a room over `/ws` and exchange whole-board timelines and
//! cursor positions. Each socket task decodes frames and forwards them to
//! the coordinator task ([`hub`]), which owns all room state and answers
//! through a per-connection outbound channel.

pub mod config;
pub mod hub;

use std::io;
use std::net::SocketAddr;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use inkroom_core::{ClientMessage, ServerMessage};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub use config::{ConfigError, ServerConfig};
pub use hub::{Hub, HubEvent, HubTx};

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Server error: {0}")]
    Io(#[from] io::Error),
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    hub: HubTx,
}

/// Build the HTTP router around a running coordinator queue.
pub fn router(hub: HubTx, config: &ServerConfig) -> Result<Router, ServerError> {
    Ok(Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(config.cors_layer()?)
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { hub }))
}

/// Bind the configured address and serve until the process is stopped.
pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let addr = config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!("InkRoom relay server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);
    serve_listener(listener, config).await
}

/// Serve on an already bound listener with a fresh coordinator.
pub async fn serve_listener(listener: TcpListener, config: ServerConfig) -> Result<(), ServerError> {
    let hub = Hub::default().spawn();
    let app = router(hub, &config)?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Index page
async fn index() -> &'static str {
    "InkRoom Relay Server - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, hub: HubTx) {
    let connection_id = Uuid::new_v4().to_string();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ServerMessage>();

    if hub
        .send(HubEvent::Connect {
            connection_id: connection_id.clone(),
            tx: out_tx,
        })
        .is_err()
    {
        warn!("Coordinator is gone, refusing connection {}", connection_id);
        return;
    }

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            // Frames from the client
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match ClientMessage::from_json(text.as_str()) {
                            Ok(message) => {
                                let event = HubEvent::Message {
                                    from: connection_id.clone(),
                                    message,
                                };
                                if hub.send(event).is_err() {
                                    break;
                                }
                            }
                            // No error channel towards clients; drop and move on.
                            Err(e) => warn!("Invalid message from {}: {}", connection_id, e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary/ping/pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", connection_id, e);
                        break;
                    }
                }
            }

            // Deliveries from the coordinator
            out = out_rx.recv() => {
                let Some(message) = out else { break };
                match message.to_json() {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("Failed to encode message for {}: {}", connection_id, e),
                }
            }
        }
    }

    let _ = hub.send(HubEvent::Disconnect {
        connection_id: connection_id.clone(),
    });
    debug!("Socket task finished: {}", connection_id);
}
