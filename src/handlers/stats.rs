use std::collections::BTreeMap;

use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::{error::AppError, models::user::Role, state::AppState};

#[derive(Debug, Serialize, FromRow)]
pub struct PlatformCounts {
    pub verified_representatives: i64,
    pub approved_organizations: i64,
    pub posts: i64,
    pub comments: i64,
    pub active_projects: i64,
    pub open_surveys: i64,
}

#[derive(Debug, Serialize)]
pub struct PublicStats {
    pub users_by_role: BTreeMap<&'static str, i64>,
    #[serde(flatten)]
    pub counts: PlatformCounts,
}

#[derive(Debug, Serialize, FromRow)]
pub struct AdminCounts {
    pub pending_verifications: i64,
    pub messages_today: i64,
    pub new_users_last_7_days: i64,
}

#[derive(Debug, Serialize)]
pub struct AdminStats {
    #[serde(flatten)]
    pub public: PublicStats,
    #[serde(flatten)]
    pub admin: AdminCounts,
    pub online_users: usize,
}

async fn public_stats(pool: &PgPool) -> Result<PublicStats, AppError> {
    let rows: Vec<(Role, i64)> =
        sqlx::query_as("SELECT role, COUNT(*) FROM users WHERE is_active GROUP BY role")
            .fetch_all(pool)
            .await?;

    // Every role is reported, zero when absent.
    let mut users_by_role: BTreeMap<&'static str, i64> =
        [Role::Citizen, Role::Representative, Role::Organization, Role::Admin]
            .into_iter()
            .map(|role| (role.as_str(), 0))
            .collect();
    for (role, count) in rows {
        users_by_role.insert(role.as_str(), count);
    }

    let counts = sqlx::query_as::<_, PlatformCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM representatives WHERE status = 'approved') AS verified_representatives,
            (SELECT COUNT(*) FROM organizations WHERE status = 'approved') AS approved_organizations,
            (SELECT COUNT(*) FROM posts WHERE deleted_at IS NULL) AS posts,
            (SELECT COUNT(*) FROM comments WHERE deleted_at IS NULL) AS comments,
            (SELECT COUNT(*) FROM projects WHERE status = 'active') AS active_projects,
            (SELECT COUNT(*) FROM surveys WHERE is_open AND (closes_at IS NULL OR closes_at > NOW())) AS open_surveys
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(PublicStats { users_by_role, counts })
}

pub async fn platform_stats(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(public_stats(&pool).await?))
}

pub async fn admin_stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let public = public_stats(&state.pool).await?;

    let admin = sqlx::query_as::<_, AdminCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM verification_requests WHERE status = 'pending') AS pending_verifications,
            (SELECT COUNT(*) FROM messages WHERE created_at >= date_trunc('day', NOW())) AS messages_today,
            (SELECT COUNT(*) FROM users WHERE created_at >= NOW() - INTERVAL '7 days') AS new_users_last_7_days
        "#,
    )
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(AdminStats {
        public,
        admin,
        online_users: state.hub.online_count().await,
    }))
}
