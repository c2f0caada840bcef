//! WebSocket push channel
//!
//! Each connection runs one `SampleLoop` on a child of the server's shutdown
//! token. The loop hands snapshots over a small bounded channel; this handler
//! drains it into the socket. When the client goes away the token is
//! cancelled and the loop is awaited, so no ticker outlives its socket.

use crate::{auth::Claims, state::AppState};
use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use futures::{SinkExt, StreamExt};
use seedkeeper_core::ViewerMessage;
use tokio::{select, sync::mpsc};

/// Pending snapshots per connection; further pushes are dropped until the
/// socket catches up
const OUTBOUND_CAPACITY: usize = 2;

/// WebSocket upgrade handler
///
/// Validates JWT from cookies before upgrading to WebSocket. The cookie is
/// checked before the upgrade headers, so an anonymous client always gets 401.
pub async fn ws_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let token = match crate::auth::extract_jwt_from_cookies(&jar) {
        Some(t) => t,
        None => {
            tracing::warn!("WebSocket connection rejected: no auth token");
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let claims = match crate::auth::validate_token(&state.auth, &token) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("WebSocket connection rejected: {}", e);
            return StatusCode::UNAUTHORIZED.into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            tracing::warn!("WebSocket upgrade refused: {}", rejection);
            return rejection.into_response();
        }
    };

    tracing::info!(
        "WebSocket connection established for user: {} (role: {})",
        claims.username,
        claims.role
    );

    ws.on_upgrade(move |socket| handle_socket(socket, state, claims))
}

async fn handle_socket(socket: WebSocket, state: AppState, claims: Claims) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = serde_json::json!({
        "type": "connected",
        "user": claims.username,
        "timestamp": chrono::Utc::now().timestamp(),
    });
    if sender
        .send(Message::Text(welcome.to_string()))
        .await
        .is_err()
    {
        return;
    }

    let cancel = state.shutdown.child_token();
    let (tx, mut rx) = mpsc::channel::<ViewerMessage>(OUTBOUND_CAPACITY);
    let sample_loop = state.control.sample_loop(claims.viewer());
    let loop_handle = tokio::spawn(sample_loop.run(tx, cancel.clone()));

    loop {
        select! {
            outbound = rx.recv() => {
                let Some(message) = outbound else { break };
                match serde_json::to_string(&message) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            tracing::debug!("Client disconnected");
                            break;
                        }
                    }
                    Err(e) => tracing::error!("Failed to serialize update: {}", e),
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("Client closed WebSocket connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message from client: {}", text);
                    }
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                    _ => {}
                }
            }

            _ = cancel.cancelled() => break,
        }
    }

    cancel.cancel();
    drop(rx);
    match loop_handle.await {
        Ok(summary) => tracing::info!(
            username = %claims.username,
            pushed = summary.pushed,
            skipped = summary.skipped,
            "WebSocket connection closed"
        ),
        Err(e) => tracing::error!("Viewer loop panicked: {}", e),
    }
    let _ = sender.close().await;
}
