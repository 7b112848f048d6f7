use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "communication_audience", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    All,
    County,
    Constituency,
    Ward,
}

impl Audience {
    /// Column of `users` the target area is matched against.
    pub fn area_column(&self) -> Option<&'static str> {
        match self {
            Audience::All => None,
            Audience::County => Some("county"),
            Audience::Constituency => Some("constituency"),
            Audience::Ward => Some("ward"),
        }
    }
}

pub const COMMUNICATION_SELECT: &str = r#"
    SELECT
        c.id, c.sender_id,
        (u.first_name || ' ' || u.last_name) AS sender_name,
        c.title, c.body, c.audience, c.target_area, c.recipients_count, c.created_at
    FROM communications c
    JOIN users u ON u.id = c.sender_id
"#;

/// Represents the 'communications' table joined with the sender's name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Communication {
    pub id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub title: String,
    pub body: String,
    pub audience: Audience,
    pub target_area: Option<String>,
    pub recipients_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

fn validate_target(req: &CreateCommunicationRequest) -> Result<(), validator::ValidationError> {
    let has_area = req.target_area.as_deref().is_some_and(|a| !a.trim().is_empty());
    match (req.audience, has_area) {
        (Audience::All, _) => Ok(()),
        (_, true) => Ok(()),
        (_, false) => Err(validator::ValidationError::new("target_area_required")),
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_target))]
pub struct CreateCommunicationRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 10000))]
    pub body: String,
    pub audience: Audience,
    #[validate(length(max = 100))]
    pub target_area: Option<String>,
}

impl CreateCommunicationRequest {
    /// The trimmed target area, or `None` for an `all` audience.
    pub fn target(&self) -> Option<&str> {
        self.audience.area_column()?;
        self.target_area.as_deref().map(str::trim).filter(|a| !a.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_audiences_need_a_target() {
        let req = CreateCommunicationRequest {
            title: "Water rationing schedule".to_string(),
            body: "Starting Monday...".to_string(),
            audience: Audience::Ward,
            target_area: None,
        };
        assert!(req.validate().is_err());

        let req = CreateCommunicationRequest {
            audience: Audience::All,
            ..req
        };
        assert!(req.validate().is_ok());
        assert_eq!(req.target(), None);
    }

    #[test]
    fn target_is_trimmed() {
        let req = CreateCommunicationRequest {
            title: "Clinic open day".to_string(),
            body: "Free screening on Saturday".to_string(),
            audience: Audience::County,
            target_area: Some("  Kisumu ".to_string()),
        };
        assert_eq!(req.target(), Some("Kisumu"));
    }

    #[test]
    fn audience_maps_to_user_columns() {
        assert_eq!(Audience::All.area_column(), None);
        assert_eq!(Audience::Constituency.area_column(), Some("constituency"));
    }
}
