use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::models::verification::{VerificationDocument, VerificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "representative_level", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RepresentativeLevel {
    National,
    County,
    Constituency,
    Ward,
    Organizational,
}

/// Representative profile joined with the owning user's name and avatar.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Representative {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub organization_id: Option<i64>,
    pub position: String,
    pub level: RepresentativeLevel,
    pub county: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
    pub party: Option<String>,
    pub bio: Option<String>,
    pub verification_documents: Json<Vec<VerificationDocument>>,
    pub status: VerificationStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

pub const REPRESENTATIVE_SELECT: &str = r#"
    SELECT
        r.id, r.user_id, u.first_name, u.last_name, u.avatar_url,
        r.organization_id, r.position, r.level, r.county, r.constituency, r.ward,
        r.party, r.bio, r.verification_documents, r.status, r.created_at, r.updated_at
    FROM representatives r
    JOIN users u ON u.id = r.user_id
"#;

/// Compact listing row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RepresentativeSummary {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub avatar_url: Option<String>,
    pub position: String,
    pub level: RepresentativeLevel,
    pub county: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
}

pub const REPRESENTATIVE_SUMMARY_SELECT: &str = r#"
    SELECT
        r.id, r.user_id, u.first_name, u.last_name, u.avatar_url,
        r.position, r.level, r.county, r.constituency, r.ward
    FROM representatives r
    JOIN users u ON u.id = r.user_id
"#;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRepresentativeRequest {
    #[validate(length(min = 2, max = 150))]
    pub position: String,
    pub level: RepresentativeLevel,
    #[validate(length(max = 100))]
    pub county: Option<String>,
    #[validate(length(max = 100))]
    pub constituency: Option<String>,
    #[validate(length(max = 100))]
    pub ward: Option<String>,
    #[validate(length(max = 150))]
    pub party: Option<String>,
    #[validate(length(max = 5000))]
    pub bio: Option<String>,
    pub organization_id: Option<i64>,
}

/// A representative below national level must name the area they serve.
pub fn check_jurisdiction(
    level: RepresentativeLevel,
    county: Option<&str>,
    constituency: Option<&str>,
    ward: Option<&str>,
) -> Result<(), &'static str> {
    let present = |v: Option<&str>| v.is_some_and(|s| !s.trim().is_empty());
    match level {
        RepresentativeLevel::County if !present(county) => Err("County representatives must specify a county"),
        RepresentativeLevel::Constituency if !present(constituency) => {
            Err("Constituency representatives must specify a constituency")
        }
        RepresentativeLevel::Ward if !present(ward) => Err("Ward representatives must specify a ward"),
        _ => Ok(()),
    }
}

impl CreateRepresentativeRequest {
    pub fn check_jurisdiction(&self) -> Result<(), &'static str> {
        check_jurisdiction(
            self.level,
            self.county.as_deref(),
            self.constituency.as_deref(),
            self.ward.as_deref(),
        )
    }
}

/// DTO for updating one's own representative profile. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRepresentativeRequest {
    #[validate(length(min = 2, max = 150))]
    pub position: Option<String>,
    #[validate(length(max = 150))]
    pub party: Option<String>,
    #[validate(length(max = 5000))]
    pub bio: Option<String>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
    #[validate(length(max = 100))]
    pub constituency: Option<String>,
    #[validate(length(max = 100))]
    pub ward: Option<String>,
}

impl UpdateRepresentativeRequest {
    /// The creation rule, applied to `current` with this update merged in.
    pub fn check_jurisdiction(&self, current: &Representative) -> Result<(), &'static str> {
        check_jurisdiction(
            current.level,
            self.county.as_deref().or(current.county.as_deref()),
            self.constituency.as_deref().or(current.constituency.as_deref()),
            self.ward.as_deref().or(current.ward.as_deref()),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct RepresentativeListParams {
    pub county: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
    pub level: Option<RepresentativeLevel>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(level: RepresentativeLevel) -> CreateRepresentativeRequest {
        CreateRepresentativeRequest {
            position: "Member of County Assembly".to_string(),
            level,
            county: Some("Kisumu".to_string()),
            constituency: None,
            ward: None,
            party: None,
            bio: None,
            organization_id: None,
        }
    }

    #[test]
    fn ward_level_requires_a_ward() {
        assert!(request(RepresentativeLevel::Ward).check_jurisdiction().is_err());
        assert!(request(RepresentativeLevel::County).check_jurisdiction().is_ok());
        assert!(request(RepresentativeLevel::National).check_jurisdiction().is_ok());
    }

    fn ward_profile() -> Representative {
        Representative {
            id: 7,
            user_id: 3,
            first_name: "Achieng".to_string(),
            last_name: "Odhiambo".to_string(),
            avatar_url: None,
            organization_id: None,
            position: "MCA".to_string(),
            level: RepresentativeLevel::Ward,
            county: Some("Kisumu".to_string()),
            constituency: Some("Kisumu Central".to_string()),
            ward: Some("Kondele".to_string()),
            party: None,
            bio: None,
            verification_documents: Json(Vec::new()),
            status: VerificationStatus::Approved,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    fn update(ward: Option<&str>) -> UpdateRepresentativeRequest {
        UpdateRepresentativeRequest {
            position: None,
            party: Some("Independent".to_string()),
            bio: None,
            county: None,
            constituency: None,
            ward: ward.map(str::to_owned),
        }
    }

    #[test]
    fn updates_keep_the_jurisdiction_rule() {
        let current = ward_profile();
        assert!(update(None).check_jurisdiction(&current).is_ok());
        assert!(update(Some("Migosi")).check_jurisdiction(&current).is_ok());
        assert!(update(Some("  ")).check_jurisdiction(&current).is_err());
    }
}
