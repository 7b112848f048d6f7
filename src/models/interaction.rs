use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Inquiry,
    Complaint,
    Feedback,
    MeetingRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "interaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    Open,
    Responded,
    Closed,
}

impl InteractionStatus {
    pub fn can_respond(self) -> bool {
        self != InteractionStatus::Closed
    }
}

/// Interaction joined with both parties' names.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Interaction {
    pub id: i64,
    pub citizen_id: i64,
    pub citizen_name: String,
    pub representative_id: i64,
    pub representative_user_id: i64,
    pub representative_name: String,
    pub kind: InteractionKind,
    pub subject: String,
    pub body: String,
    pub status: InteractionStatus,
    pub response: Option<String>,
    pub responded_at: Option<chrono::DateTime<chrono::Utc>>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub const INTERACTION_SELECT: &str = r#"
    SELECT
        i.id, i.citizen_id,
        (c.first_name || ' ' || c.last_name) AS citizen_name,
        i.representative_id,
        r.user_id AS representative_user_id,
        (ru.first_name || ' ' || ru.last_name) AS representative_name,
        i.kind, i.subject, i.body, i.status, i.response, i.responded_at,
        i.created_at, i.updated_at
    FROM interactions i
    JOIN users c ON c.id = i.citizen_id
    JOIN representatives r ON r.id = i.representative_id
    JOIN users ru ON ru.id = r.user_id
"#;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInteractionRequest {
    pub representative_id: i64,
    pub kind: InteractionKind,
    #[validate(length(min = 3, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub body: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RespondInteractionRequest {
    #[validate(length(min = 1, max = 5000))]
    pub response: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionRoleView {
    #[default]
    Citizen,
    Representative,
}

#[derive(Debug, Deserialize)]
pub struct InteractionListParams {
    #[serde(rename = "as", default)]
    pub view: InteractionRoleView,
    pub status: Option<InteractionStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
