use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Review state shared by verification requests, organizations and
/// representative profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    /// Only pending requests can be decided; decisions are final.
    pub fn can_transition_to(self, target: VerificationStatus) -> bool {
        matches!(
            (self, target),
            (VerificationStatus::Pending, VerificationStatus::Approved)
                | (VerificationStatus::Pending, VerificationStatus::Rejected)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_subject", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationSubject {
    Representative,
    Organization,
    Citizen,
}

/// An uploaded supporting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationDocument {
    pub name: String,
    pub url: String,
    pub content_type: String,
    pub uploaded_at: chrono::DateTime<chrono::Utc>,
}

pub const VERIFICATION_COLUMNS: &str = "id, user_id, subject, subject_id, documents, status, reviewer_id, \
     review_notes, created_at, reviewed_at";

/// Represents the 'verification_requests' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct VerificationRequest {
    pub id: i64,
    pub user_id: i64,
    pub subject: VerificationSubject,
    pub subject_id: i64,
    pub documents: sqlx::types::Json<Vec<VerificationDocument>>,
    pub status: VerificationStatus,
    pub reviewer_id: Option<i64>,
    pub review_notes: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reviewed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct VerificationListParams {
    pub status: Option<VerificationStatus>,
    pub subject: Option<VerificationSubject>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use VerificationStatus::{Approved, Pending, Rejected};

    #[test]
    fn only_pending_requests_can_be_decided() {
        assert!(Pending.can_transition_to(Approved));
        assert!(Pending.can_transition_to(Rejected));

        assert!(!Pending.can_transition_to(Pending));
        assert!(!Approved.can_transition_to(Rejected));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Approved.can_transition_to(Pending));
    }
}
