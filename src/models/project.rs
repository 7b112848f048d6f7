use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planned,
    Active,
    Completed,
    Cancelled,
}

pub const PROJECT_COLUMNS: &str = "id, organization_id, title, description, status, budget, county, \
     start_date, end_date, created_at, updated_at";

/// Represents the 'projects' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: i64,
    pub organization_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    /// Whole currency units.
    pub budget: Option<i64>,
    pub county: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'impact_metrics' table in the database.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ImpactMetric {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub value: f64,
    pub unit: Option<String>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub metrics: Vec<ImpactMetric>,
}

fn validate_dates(req: &CreateProjectRequest) -> Result<(), validator::ValidationError> {
    match (req.start_date, req.end_date) {
        (Some(start), Some(end)) if end < start => Err(validator::ValidationError::new("end_before_start")),
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_dates))]
pub struct CreateProjectRequest {
    pub organization_id: i64,
    #[validate(length(min = 3, max = 200))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    #[validate(range(min = 0))]
    pub budget: Option<i64>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

/// DTO for updating a project. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    #[validate(range(min = 0))]
    pub budget: Option<i64>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMetricRequest {
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    pub value: f64,
    #[validate(length(max = 50))]
    pub unit: Option<String>,
    pub recorded_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectListParams {
    pub organization_id: Option<i64>,
    pub status: Option<ProjectStatus>,
    pub county: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}
