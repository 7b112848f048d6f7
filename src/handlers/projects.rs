use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        pagination::{Page, PageParams},
        project::{
            CreateMetricRequest, CreateProjectRequest, ImpactMetric, PROJECT_COLUMNS, Project, ProjectDetail,
            ProjectListParams, UpdateProjectRequest,
        },
        verification::VerificationStatus,
    },
    utils::{html::plain_text, jwt::AuthUser},
};

const METRIC_COLUMNS: &str = "id, project_id, name, value, unit, recorded_at";

async fn fetch_project(pool: &PgPool, id: i64) -> Result<Project, AppError> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
    sqlx::query_as::<_, Project>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

/// Owner and verification status of an organization.
async fn organization_owner(pool: &PgPool, organization_id: i64) -> Result<(i64, VerificationStatus), AppError> {
    sqlx::query_as("SELECT owner_id, status FROM organizations WHERE id = $1")
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))
}

/// The project's organization owner, or an admin.
async fn ensure_project_manager(pool: &PgPool, user: &AuthUser, project: &Project) -> Result<(), AppError> {
    let (owner_id, _) = organization_owner(pool, project.organization_id).await?;
    if !user.can_manage(owner_id) {
        return Err(AppError::Forbidden(
            "Only the organization owner can manage this project".to_string(),
        ));
    }
    Ok(())
}

async fn metrics_of(pool: &PgPool, project_id: i64) -> Result<Vec<ImpactMetric>, AppError> {
    let sql = format!("SELECT {METRIC_COLUMNS} FROM impact_metrics WHERE project_id = $1 ORDER BY recorded_at, id");
    Ok(sqlx::query_as::<_, ImpactMetric>(&sql)
        .bind(project_id)
        .fetch_all(pool)
        .await?)
}

/// Creates a project under an approved organization the caller owns.
pub async fn create_project(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (owner_id, status) = organization_owner(&pool, payload.organization_id).await?;
    if !user.can_manage(owner_id) {
        return Err(AppError::Forbidden(
            "Only the organization owner can create projects".to_string(),
        ));
    }
    if status != VerificationStatus::Approved {
        return Err(AppError::Forbidden(
            "The organization must be verified before adding projects".to_string(),
        ));
    }

    let sql = format!(
        "INSERT INTO projects (organization_id, title, description, status, budget, county, start_date, end_date) \
         VALUES ($1, $2, $3, COALESCE($4, 'planned'::project_status), $5, $6, $7, $8) RETURNING {PROJECT_COLUMNS}"
    );
    let project = sqlx::query_as::<_, Project>(&sql)
        .bind(payload.organization_id)
        .bind(plain_text(&payload.title))
        .bind(payload.description.as_deref().map(plain_text))
        .bind(payload.status)
        .bind(payload.budget)
        .bind(&payload.county)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .fetch_one(&pool)
        .await?;

    tracing::info!(project_id = project.id, organization_id = project.organization_id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn list_projects(
    State(pool): State<PgPool>,
    Query(params): Query<ProjectListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        if let Some(organization_id) = params.organization_id {
            qb.push(" AND organization_id = ").push_bind(organization_id);
        }
        if let Some(status) = params.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(county) = params.county.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            qb.push(" AND LOWER(county) = LOWER(").push_bind(county.to_string()).push(")");
        }
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM projects");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {PROJECT_COLUMNS} FROM projects"));
    push_filters(&mut qb);
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let projects: Vec<Project> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(projects, page, total)))
}

pub async fn get_project(State(pool): State<PgPool>, Path(id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    let project = fetch_project(&pool, id).await?;
    let metrics = metrics_of(&pool, id).await?;
    Ok(Json(ProjectDetail { project, metrics }))
}

pub async fn update_project(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let current = fetch_project(&pool, id).await?;
    ensure_project_manager(&pool, &user, &current).await?;

    let start = payload.start_date.or(current.start_date);
    let end = payload.end_date.or(current.end_date);
    if matches!((start, end), (Some(start), Some(end)) if end < start) {
        return Err(AppError::BadRequest("end_date cannot precede start_date".to_string()));
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE projects SET updated_at = NOW()");
    if let Some(title) = &payload.title {
        qb.push(", title = ").push_bind(plain_text(title));
    }
    if let Some(description) = &payload.description {
        qb.push(", description = ").push_bind(plain_text(description));
    }
    if let Some(status) = payload.status {
        qb.push(", status = ").push_bind(status);
    }
    if let Some(budget) = payload.budget {
        qb.push(", budget = ").push_bind(budget);
    }
    if let Some(county) = &payload.county {
        qb.push(", county = ").push_bind(county);
    }
    if let Some(start_date) = payload.start_date {
        qb.push(", start_date = ").push_bind(start_date);
    }
    if let Some(end_date) = payload.end_date {
        qb.push(", end_date = ").push_bind(end_date);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(format!(" RETURNING {PROJECT_COLUMNS}"));

    let project: Project = qb.build_query_as().fetch_one(&pool).await?;
    Ok(Json(project))
}

pub async fn add_metric(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<CreateMetricRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if !payload.value.is_finite() {
        return Err(AppError::BadRequest("Metric value must be a finite number".to_string()));
    }
    let project = fetch_project(&pool, id).await?;
    ensure_project_manager(&pool, &user, &project).await?;

    let sql = format!(
        "INSERT INTO impact_metrics (project_id, name, value, unit, recorded_at) \
         VALUES ($1, $2, $3, $4, COALESCE($5, NOW())) RETURNING {METRIC_COLUMNS}"
    );
    let metric = sqlx::query_as::<_, ImpactMetric>(&sql)
        .bind(id)
        .bind(payload.name.trim())
        .bind(payload.value)
        .bind(&payload.unit)
        .bind(payload.recorded_at)
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(metric)))
}

pub async fn list_metrics(State(pool): State<PgPool>, Path(id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    fetch_project(&pool, id).await?;
    Ok(Json(metrics_of(&pool, id).await?))
}
