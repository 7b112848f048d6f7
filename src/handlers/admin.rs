// src/handlers/admin.rs

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
        location::{CreateLocationRequest, Location},
        pagination::{Page, PageParams},
        user::{AdminUpdateUserRequest, Role, USER_COLUMNS, User, UserSearchParams},
    },
    utils::jwt::AuthUser,
};

use super::users::{fetch_user, push_user_filters};

/// Lists all users in the system.
/// Admin only.
pub async fn list_users(
    State(pool): State<PgPool>,
    Query(params): Query<UserSearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");
    push_user_filters(&mut count, params.q.as_deref(), params.role);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
    push_user_filters(&mut qb, params.q.as_deref(), params.role);
    qb.push(" ORDER BY id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let users: Vec<User> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(users, page, total)))
}

/// Updates role, activation or verification of a user.
/// Admins cannot demote or deactivate themselves.
pub async fn update_user(
    State(pool): State<PgPool>,
    admin: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AdminUpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if id == admin.id {
        if payload.role.is_some_and(|role| role != Role::Admin) {
            return Err(AppError::BadRequest("You cannot change your own role".to_string()));
        }
        if payload.is_active == Some(false) {
            return Err(AppError::BadRequest("You cannot deactivate your own account".to_string()));
        }
    }

    // 404 before building the update.
    fetch_user(&pool, id).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");
    if let Some(role) = payload.role {
        qb.push(", role = ").push_bind(role);
    }
    if let Some(is_verified) = payload.is_verified {
        qb.push(", is_verified = ").push_bind(is_verified);
    }
    if let Some(is_active) = payload.is_active {
        qb.push(", is_active = ").push_bind(is_active);
        if !is_active {
            qb.push(", token_version = token_version + 1");
        }
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(format!(" RETURNING {USER_COLUMNS}"));

    let user: User = qb.build_query_as().fetch_one(&pool).await?;
    tracing::info!(admin_id = admin.id, user_id = id, "user updated by admin");

    Ok(Json(user))
}

/// Deletes a user by ID.
/// Admin only. An admin cannot delete themselves.
pub async fn delete_user(
    State(pool): State<PgPool>,
    admin: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == admin.id {
        return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(admin_id = admin.id, user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Adds a county, constituency or ward row.
pub async fn create_location(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateLocationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let location = sqlx::query_as::<_, Location>(
        "INSERT INTO locations (county, constituency, ward) VALUES ($1, $2, $3) \
         RETURNING id, county, constituency, ward",
    )
    .bind(payload.county.trim())
    .bind(payload.constituency.as_deref().map(str::trim))
    .bind(payload.ward.as_deref().map(str::trim))
    .fetch_one(&pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Location already exists".to_string()),
        other => other,
    })?;

    Ok((StatusCode::CREATED, Json(location)))
}
