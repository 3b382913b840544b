//! Static site serving for `loko serve`, with a hot-reload websocket

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

/// Broadcast channel for reload notifications; `loko serve` sends one
/// message per completed watch rebuild.
#[derive(Clone)]
pub struct ReloadHub {
    tx: broadcast::Sender<String>,
}

impl ReloadHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        ReloadHub { tx }
    }

    /// Tell connected browsers to refresh. Dropped silently with no clients.
    pub fn notify(&self) {
        let _ = self.tx.send("reload".to_string());
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for ReloadHub {
    fn default() -> Self {
        Self::new()
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<ReloadHub>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(mut socket: WebSocket, hub: ReloadHub) {
    let mut rx = hub.subscribe();
    loop {
        tokio::select! {
            message = rx.recv() => {
                match message {
                    Ok(text) => {
                        if socket.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = socket.recv() => {
                // Any close (or error) from the client ends the session.
                match incoming {
                    Some(Ok(_)) => continue,
                    _ => break,
                }
            }
        }
    }
}

/// Serve a built site directory until cancellation.
pub async fn serve_site(
    dist: PathBuf,
    addr: SocketAddr,
    hub: ReloadHub,
    cancel: CancellationToken,
) -> Result<()> {
    let router = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(hub)
        .fallback_service(ServeDir::new(&dist));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, dist = %dist.display(), "site server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("site server failed")
}
