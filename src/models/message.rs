use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Delivery state of a direct message.
///
/// Ordered: a message only ever moves forward, `sent` → `delivered` →
/// `read` (skipping `delivered` is allowed).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "message_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
}

impl MessageStatus {
    /// Returns the new status if `target` is a forward move, `None` otherwise.
    pub fn advance(self, target: MessageStatus) -> Option<MessageStatus> {
        (target > self).then_some(target)
    }
}

pub const MESSAGE_COLUMNS: &str = "id, sender_id, recipient_id, content, attachment_url, status, \
     delivered_at, read_at, created_at";

/// Represents the 'messages' table in the database.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, ToSchema)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub content: String,
    pub attachment_url: Option<String>,
    pub status: MessageStatus,
    pub delivered_at: Option<chrono::DateTime<chrono::Utc>>,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SendMessageRequest {
    pub recipient_id: i64,
    #[validate(length(
        min = 1,
        max = 5000,
        message = "Message must be between 1 and 5000 characters"
    ))]
    pub content: String,
    #[validate(url)]
    pub attachment_url: Option<String>,
}

/// One row of the conversation list: the latest message exchanged with a
/// counterpart plus the number of unread incoming messages.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ConversationSummary {
    pub counterpart_id: i64,
    pub counterpart_name: String,
    pub counterpart_avatar: Option<String>,
    pub counterpart_role: crate::models::user::Role,
    pub last_message_id: i64,
    pub last_message: String,
    pub last_sender_id: i64,
    pub last_status: MessageStatus,
    pub last_message_at: chrono::DateTime<chrono::Utc>,
    pub unread_count: i64,
}

/// Cursor pagination for a single conversation, newest first.
#[derive(Debug, Deserialize)]
pub struct ConversationParams {
    /// Return messages older than this message id.
    pub before: Option<i64>,
    pub limit: Option<i64>,
}

impl ConversationParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use MessageStatus::{Delivered, Read, Sent};

    #[test]
    fn status_only_moves_forward() {
        assert_eq!(Sent.advance(Delivered), Some(Delivered));
        assert_eq!(Sent.advance(Read), Some(Read));
        assert_eq!(Delivered.advance(Read), Some(Read));

        assert_eq!(Read.advance(Delivered), None);
        assert_eq!(Delivered.advance(Sent), None);
        assert_eq!(Read.advance(Read), None);
    }

    #[test]
    fn conversation_page_size_is_bounded() {
        let params = ConversationParams {
            before: None,
            limit: Some(1000),
        };
        assert_eq!(params.limit(), 100);
    }
}
