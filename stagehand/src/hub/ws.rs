//! WebSocket transport for the push hub.
//!
//! One route, `GET /ws/notifications?token=...`. The handler upgrades
//! the connection, wraps the socket's send half in a [`PushChannel`],
//! and registers it with the hub. The receive half runs a small loop
//! that answers `ping` frames and tears the channel down when the peer
//! goes away.

use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::channel::{ChannelError, PushChannel};
use super::{CredentialVerifier, NotificationStore, PushHub};

/// Keepalive frame sent by clients.
pub const PING_FRAME: &str = "ping";

/// Keepalive reply sent back on the same channel.
pub const PONG_FRAME: &str = "pong";

/// Query parameters accepted on the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsParams {
    /// Bearer credential for the handshake.
    pub token: Option<String>,
}

/// Builds a router exposing the notification socket at
/// `/ws/notifications`.
pub fn routes<V, N>(hub: Arc<PushHub<V, N>>) -> Router
where
    V: CredentialVerifier,
    N: NotificationStore,
{
    Router::new()
        .route("/ws/notifications", get(handler::<V, N>))
        .with_state(hub)
}

/// Upgrade handler for the notification socket.
pub async fn handler<V, N>(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(hub): State<Arc<PushHub<V, N>>>,
) -> impl IntoResponse
where
    V: CredentialVerifier,
    N: NotificationStore,
{
    let credential = params.token.unwrap_or_default();
    ws.on_upgrade(move |socket| serve_connection(hub, socket, credential))
}

/// Drives one socket from registration to teardown.
async fn serve_connection<V, N>(hub: Arc<PushHub<V, N>>, socket: WebSocket, credential: String)
where
    V: CredentialVerifier,
    N: NotificationStore,
{
    let (sender, mut receiver) = socket.split();
    let channel: Arc<dyn PushChannel> = Arc::new(WsChannel::new(sender));

    // On rejection the hub has already closed the channel with the
    // rejection code; nothing left to do here.
    let registration = match hub.register(&credential, Arc::clone(&channel)).await {
        Ok(registration) => registration,
        Err(_) => return,
    };

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) if text.as_str() == PING_FRAME => {
                if channel.send(PONG_FRAME.to_string()).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "websocket receive failed");
                break;
            }
        }
    }

    hub.unregister(&registration.subject_id, registration.channel_id);
}

/// [`PushChannel`] over the send half of an axum WebSocket.
struct WsChannel {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsChannel {
    fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

impl PushChannel for WsChannel {
    fn send(
        &self,
        text: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ChannelError>> + Send + '_>>
    {
        Box::pin(async move {
            let mut sender = self.sender.lock().await;
            sender
                .send(Message::Text(text.into()))
                .await
                .map_err(|err| ChannelError::Transport(err.to_string()))
        })
    }

    fn close(
        &self,
        code: u16,
        reason: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let mut sender = self.sender.lock().await;
            let frame = CloseFrame {
                code,
                reason: reason.into(),
            };
            if let Err(err) = sender.send(Message::Close(Some(frame))).await {
                debug!(error = %err, "close frame not delivered, peer already gone");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keepalive_frames() {
        assert_eq!(PING_FRAME, "ping");
        assert_eq!(PONG_FRAME, "pong");
    }

    #[test]
    fn test_ws_params_token_optional() {
        let params: WsParams = serde_json::from_str("{}").unwrap();
        assert!(params.token.is_none());

        let params: WsParams = serde_json::from_str(r#"{"token": "tok-abc"}"#).unwrap();
        assert_eq!(params.token.as_deref(), Some("tok-abc"));
    }
}
