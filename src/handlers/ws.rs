//! `GET /ws`: one socket per browser tab, fed by the realtime hub.
//!
//! The connection is authenticated before the upgrade. Each socket gets a
//! writer task draining an mpsc channel registered with the [`Hub`]; the
//! read loop handles client events until the socket closes.
//!
//! [`Hub`]: crate::services::realtime::Hub

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::{
    error::AppError,
    models::message::MessageStatus,
    services::realtime::{CONNECTION_BUFFER, ClientEvent, ServerEvent},
    state::AppState,
    utils::jwt::{authenticate, token_from_headers},
};

use super::messages::advance_status;

#[derive(Debug, Deserialize)]
pub struct WsAuthQuery {
    token: Option<String>,
}

/// The `?token=` query parameter wins over the header and cookie, since
/// browsers cannot set headers on a socket handshake.
fn pick_token(query: Option<String>, headers: &HeaderMap) -> Option<String> {
    query
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .or_else(|| token_from_headers(headers))
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsAuthQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let token = pick_token(query.token, &headers)
        .ok_or_else(|| AppError::AuthError("Authentication required".to_string()))?;
    let user = authenticate(&state, &token).await?;

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    tracing::info!(user_id = user.id, "websocket upgrade accepted");
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user.id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: i64) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(CONNECTION_BUFFER);
    let connection = state.hub.register(user_id, tx.clone()).await;

    let writer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!("failed to encode server event: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                Ok(event) => handle_client_event(&state, user_id, event, &tx).await,
                Err(e) => {
                    let _ = tx
                        .send(ServerEvent::Error {
                            message: format!("Unrecognized event: {e}"),
                        })
                        .await;
                }
            },
            Ok(Message::Close(_)) | Err(_) => break,
            // Protocol pings are answered by axum.
            Ok(_) => {}
        }
    }

    state.hub.unregister(user_id, connection).await;
    drop(tx);
    let _ = writer.await;
    tracing::info!(user_id, "websocket disconnected");
}

async fn handle_client_event(state: &AppState, user_id: i64, event: ClientEvent, tx: &mpsc::Sender<ServerEvent>) {
    let (message_id, target) = match event {
        ClientEvent::Ping => {
            let _ = tx.send(ServerEvent::Pong).await;
            return;
        }
        ClientEvent::Typing { to } => {
            if to != user_id {
                state.hub.send_to(to, ServerEvent::Typing { from: user_id }).await;
            }
            return;
        }
        ClientEvent::Ack { message_id } => (message_id, MessageStatus::Delivered),
        ClientEvent::Read { message_id } => (message_id, MessageStatus::Read),
    };

    if let Err(e) = advance_status(&state.pool, &state.hub, user_id, message_id, target).await {
        tracing::debug!(user_id, message_id, "socket status update rejected: {e}");
        let _ = tx
            .send(ServerEvent::Error {
                message: format!("Cannot update message {message_id}"),
            })
            .await;
    }
}
