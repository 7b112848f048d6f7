use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::verification::VerificationStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "organization_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrganizationType {
    Ngo,
    Cbo,
    FaithBased,
    Private,
    Government,
    Other,
}

pub const ORGANIZATION_COLUMNS: &str = "id, owner_id, name, registration_number, org_type, description, \
     contact_email, contact_phone, website, county, logo_url, status, created_at, updated_at";

/// Represents the 'organizations' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Organization {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub registration_number: String,
    pub org_type: OrganizationType,
    pub description: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub website: Option<String>,
    pub county: Option<String>,
    pub logo_url: Option<String>,
    pub status: VerificationStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Organization with its linked representatives.
#[derive(Debug, Serialize)]
pub struct OrganizationDetail {
    #[serde(flatten)]
    pub organization: Organization,
    pub members: Vec<crate::models::representative::RepresentativeSummary>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrganizationRequest {
    #[validate(length(min = 2, max = 200))]
    pub name: String,
    #[validate(length(min = 2, max = 100))]
    pub registration_number: String,
    pub org_type: OrganizationType,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 20))]
    pub contact_phone: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
}

/// DTO for updating an organization. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrganizationRequest {
    #[validate(length(min = 2, max = 200))]
    pub name: Option<String>,
    pub org_type: Option<OrganizationType>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(email)]
    pub contact_email: Option<String>,
    #[validate(length(max = 20))]
    pub contact_phone: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
}

impl UpdateOrganizationRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.org_type.is_none()
            && self.description.is_none()
            && self.contact_email.is_none()
            && self.contact_phone.is_none()
            && self.website.is_none()
            && self.county.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct OrganizationListParams {
    pub status: Option<VerificationStatus>,
    pub org_type: Option<OrganizationType>,
    pub county: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub representative_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_update_is_detected() {
        let update: UpdateOrganizationRequest = serde_json::from_str("{}").unwrap();
        assert!(update.is_empty());

        let update: UpdateOrganizationRequest = serde_json::from_str(r#"{"org_type":"faith_based"}"#).unwrap();
        assert!(!update.is_empty());
        assert_eq!(update.org_type, Some(OrganizationType::FaithBased));
    }

    #[test]
    fn registration_requires_valid_contact_email() {
        let req = CreateOrganizationRequest {
            name: "Kibera Youth Network".to_string(),
            registration_number: "CBO/2021/114".to_string(),
            org_type: OrganizationType::Cbo,
            description: None,
            contact_email: Some("nope".to_string()),
            contact_phone: None,
            website: None,
            county: Some("Nairobi".to_string()),
        };
        assert!(req.validate().is_err());
    }
}
