use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        message::{ConversationParams, ConversationSummary, MESSAGE_COLUMNS, Message, MessageStatus, SendMessageRequest},
        notification::{NewNotification, NotificationKind},
    },
    services::{
        notifier,
        realtime::{Hub, ServerEvent},
    },
    state::AppState,
    utils::jwt::AuthUser,
};

/// Sends a direct message.
///
/// The message is stored as `sent`. If the recipient has a live socket it is
/// pushed right away and marked `delivered`; otherwise the recipient gets a
/// stored notification instead.
#[utoipa::path(
    post,
    path = "/api/messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored", body = Message),
        (status = 400, description = "Invalid recipient or content"),
        (status = 404, description = "Recipient not found")
    ),
    security(("bearer" = [])),
    tag = "messages"
)]
pub async fn send_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.recipient_id == user.id {
        return Err(AppError::BadRequest("You cannot message yourself".to_string()));
    }
    let content = payload.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Message cannot be empty".to_string()));
    }

    let recipient_active: bool = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
        .bind(payload.recipient_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipient not found".to_string()))?;
    if !recipient_active {
        return Err(AppError::BadRequest("Recipient account is not active".to_string()));
    }

    let sql = format!(
        "INSERT INTO messages (sender_id, recipient_id, content, attachment_url) \
         VALUES ($1, $2, $3, $4) RETURNING {MESSAGE_COLUMNS}"
    );
    let mut message = sqlx::query_as::<_, Message>(&sql)
        .bind(user.id)
        .bind(payload.recipient_id)
        .bind(content)
        .bind(&payload.attachment_url)
        .fetch_one(&state.pool)
        .await?;

    let pushed = state
        .hub
        .send_to(message.recipient_id, ServerEvent::Message { message: message.clone() })
        .await;

    if pushed > 0 {
        message = mark_status(&state.pool, &state.hub, &message, MessageStatus::Delivered).await?;
    } else {
        let sender_name: String = sqlx::query_scalar("SELECT first_name || ' ' || last_name FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(&state.pool)
            .await
            .unwrap_or_else(|_| "Someone".to_string());
        notifier::notify(
            &state.pool,
            &state.hub,
            message.recipient_id,
            NewNotification::new(NotificationKind::Message, "New message", format!("{sender_name} sent you a message"))
                .link(format!("/messages/{}", user.id))
                .data(json!({ "message_id": message.id, "sender_id": user.id })),
        )
        .await;
    }

    tracing::debug!(message_id = message.id, delivered = pushed > 0, "message sent");
    Ok((StatusCode::CREATED, Json(message)))
}

/// Moves `message` forward to `target` and tells the sender. Backward moves
/// are ignored and return the message unchanged.
async fn mark_status(pool: &PgPool, hub: &Hub, message: &Message, target: MessageStatus) -> Result<Message, AppError> {
    if message.status.advance(target).is_none() {
        return Ok(message.clone());
    }

    let sql = format!(
        "UPDATE messages SET status = $2, \
             delivered_at = COALESCE(delivered_at, NOW()), \
             read_at = CASE WHEN $2 = 'read'::message_status THEN NOW() ELSE read_at END \
         WHERE id = $1 AND status < $2 RETURNING {MESSAGE_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, Message>(&sql)
        .bind(message.id)
        .bind(target)
        .fetch_optional(pool)
        .await?;

    match updated {
        Some(updated) => {
            hub.send_to(
                updated.sender_id,
                ServerEvent::MessageStatus {
                    message_id: updated.id,
                    status: updated.status,
                },
            )
            .await;
            Ok(updated)
        }
        // Someone else advanced it first; report what is stored now.
        None => fetch_message(pool, message.id).await,
    }
}

async fn fetch_message(pool: &PgPool, id: i64) -> Result<Message, AppError> {
    let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
    sqlx::query_as::<_, Message>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".to_string()))
}

/// Advances a message on behalf of its recipient. Shared by the REST
/// endpoints and the socket `ack`/`read` events.
pub(crate) async fn advance_status(
    pool: &PgPool,
    hub: &Hub,
    user_id: i64,
    message_id: i64,
    target: MessageStatus,
) -> Result<Message, AppError> {
    let message = fetch_message(pool, message_id).await?;
    if message.recipient_id != user_id {
        return Err(AppError::Forbidden("Only the recipient can update a message status".to_string()));
    }
    mark_status(pool, hub, &message, target).await
}

pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let message = advance_status(&state.pool, &state.hub, user.id, id, MessageStatus::Read).await?;
    Ok(Json(message))
}

pub async fn mark_delivered(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let message = advance_status(&state.pool, &state.hub, user.id, id, MessageStatus::Delivered).await?;
    Ok(Json(message))
}

/// One row per counterpart with the latest message and the unread count,
/// most recent conversation first.
#[utoipa::path(
    get,
    path = "/api/messages/conversations",
    responses((status = 200, description = "Conversation summaries", body = [ConversationSummary])),
    security(("bearer" = [])),
    tag = "messages"
)]
pub async fn list_conversations(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let conversations = sqlx::query_as::<_, ConversationSummary>(
        r#"
        WITH mine AS (
            SELECT m.*,
                   CASE WHEN m.sender_id = $1 THEN m.recipient_id ELSE m.sender_id END AS counterpart_id
            FROM messages m
            WHERE (m.sender_id = $1 AND NOT m.deleted_by_sender)
               OR (m.recipient_id = $1 AND NOT m.deleted_by_recipient)
        ),
        latest AS (
            SELECT DISTINCT ON (counterpart_id)
                   counterpart_id, id, content, sender_id, status, created_at
            FROM mine
            ORDER BY counterpart_id, created_at DESC, id DESC
        ),
        unread AS (
            SELECT counterpart_id, COUNT(*) AS unread_count
            FROM mine
            WHERE recipient_id = $1 AND status <> 'read'
            GROUP BY counterpart_id
        )
        SELECT
            l.counterpart_id,
            (u.first_name || ' ' || u.last_name) AS counterpart_name,
            u.avatar_url AS counterpart_avatar,
            u.role AS counterpart_role,
            l.id AS last_message_id,
            l.content AS last_message,
            l.sender_id AS last_sender_id,
            l.status AS last_status,
            l.created_at AS last_message_at,
            COALESCE(n.unread_count, 0) AS unread_count
        FROM latest l
        JOIN users u ON u.id = l.counterpart_id
        LEFT JOIN unread n ON n.counterpart_id = l.counterpart_id
        ORDER BY l.created_at DESC, l.id DESC
        "#,
    )
    .bind(user.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(conversations))
}

#[derive(Debug, Serialize)]
pub struct ConversationPage {
    pub messages: Vec<Message>,
    /// Pass as `before` to load older messages; absent on the last page.
    pub next_before: Option<i64>,
}

/// Messages exchanged with `other_id`, newest first. Opening the
/// conversation marks every incoming message as read.
pub async fn get_conversation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(other_id): Path<i64>,
    Query(params): Query<ConversationParams>,
) -> Result<impl IntoResponse, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(other_id)
        .fetch_one(&state.pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let read_ids: Vec<i64> = sqlx::query_scalar(
        "UPDATE messages SET status = 'read', read_at = NOW(), delivered_at = COALESCE(delivered_at, NOW()) \
         WHERE sender_id = $1 AND recipient_id = $2 AND status <> 'read' RETURNING id",
    )
    .bind(other_id)
    .bind(user.id)
    .fetch_all(&state.pool)
    .await?;

    for message_id in &read_ids {
        state
            .hub
            .send_to(
                other_id,
                ServerEvent::MessageStatus {
                    message_id: *message_id,
                    status: MessageStatus::Read,
                },
            )
            .await;
    }

    let limit = params.limit();
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages \
         WHERE ((sender_id = $1 AND recipient_id = $2 AND NOT deleted_by_sender) \
             OR (sender_id = $2 AND recipient_id = $1 AND NOT deleted_by_recipient)) \
           AND ($3::BIGINT IS NULL OR id < $3) \
         ORDER BY id DESC LIMIT $4"
    );
    let messages = sqlx::query_as::<_, Message>(&sql)
        .bind(user.id)
        .bind(other_id)
        .bind(params.before)
        .bind(limit)
        .fetch_all(&state.pool)
        .await?;

    let next_before = (messages.len() as i64 == limit)
        .then(|| messages.last().map(|m| m.id))
        .flatten();

    Ok(Json(ConversationPage { messages, next_before }))
}

pub async fn unread_count(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND status <> 'read' AND NOT deleted_by_recipient",
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(json!({ "count": count })))
}

/// Hides a message for the caller. The row is removed once both sides
/// have deleted it.
pub async fn delete_message(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let (sender_id, recipient_id): (i64, i64) =
        sqlx::query_as("SELECT sender_id, recipient_id FROM messages WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Message not found".to_string()))?;

    let column = if user.id == sender_id {
        "deleted_by_sender"
    } else if user.id == recipient_id {
        "deleted_by_recipient"
    } else {
        return Err(AppError::NotFound("Message not found".to_string()));
    };

    sqlx::query(&format!("UPDATE messages SET {column} = TRUE WHERE id = $1"))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM messages WHERE id = $1 AND deleted_by_sender AND deleted_by_recipient")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}
