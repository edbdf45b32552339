//! WebSocket endpoint for the live viewing relay.

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use super::{Inbound, LiveHub, Outbound, Role};
use crate::services::{TokenKeys, TokenKind};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    /// Staff token. Without a valid one the connection is a customer.
    #[serde(default)]
    token: Option<String>,
}

/// Role of a new connection. Only a valid staff token gets the admin side.
#[must_use]
pub fn connection_role(keys: &TokenKeys, token: Option<&str>) -> Role {
    match token {
        Some(token) if keys.decode(token, TokenKind::Staff).is_ok() => Role::Admin,
        _ => Role::Customer,
    }
}

/// `GET /api/live/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
) -> impl IntoResponse {
    let role = connection_role(state.keys(), params.token.as_deref());
    let hub = state.live().clone();

    ws.on_upgrade(move |socket| handle_socket(socket, hub, role))
}

async fn handle_socket(socket: WebSocket, hub: LiveHub, role: Role) {
    let (mut sender, mut receiver) = socket.split();
    let (connection_id, mut outbound) = hub.connect(role).await;

    // Ends when the hub drops the connection's sender or the socket closes
    let writer = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize live event");
                    continue;
                }
            };
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<Inbound>(&text) {
                Ok(event) => hub.handle(&connection_id, event).await,
                Err(e) => {
                    debug!(connection_id = %connection_id, error = %e, "Invalid live event");
                    hub.send(
                        &connection_id,
                        Outbound::Error {
                            message: format!("Invalid event: {e}"),
                        },
                    )
                    .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(connection_id = %connection_id, error = %e, "Live socket error");
                break;
            }
        }
    }

    hub.disconnect(&connection_id).await;
    writer.abort();
}
