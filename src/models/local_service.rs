use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const LOCAL_SERVICE_COLUMNS: &str =
    "id, organization_id, created_by, name, category, description, county, address, contact, website, created_at";

/// Represents the 'local_services' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LocalService {
    pub id: i64,
    pub organization_id: Option<i64>,
    pub created_by: i64,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub county: Option<String>,
    pub address: Option<String>,
    pub contact: Option<String>,
    pub website: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateLocalServiceRequest {
    pub organization_id: Option<i64>,
    #[validate(length(min = 2, max = 200))]
    pub name: String,
    #[validate(length(min = 2, max = 100))]
    pub category: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub contact: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
}

/// DTO for updating a local service. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateLocalServiceRequest {
    #[validate(length(min = 2, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 2, max = 100))]
    pub category: Option<String>,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 100))]
    pub contact: Option<String>,
    #[validate(url)]
    pub website: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocalServiceListParams {
    pub category: Option<String>,
    pub county: Option<String>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
