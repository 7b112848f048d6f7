use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        pagination::{Page, PageParams},
        user::{PublicProfile, USER_COLUMNS, UpdateProfileRequest, User, UserSearchParams},
    },
    services::sms::normalize_phone,
    state::AppState,
    utils::{
        jwt::{AuthUser, clear_session_cookie},
        upload::{Accept, discard, read_single, store},
    },
};

pub(crate) const PUBLIC_PROFILE_COLUMNS: &str =
    "id, first_name, last_name, role, is_verified, county, constituency, ward, bio, avatar_url, created_at";

/// Loads a full user row; 404 if it does not exist.
pub(crate) async fn fetch_user(pool: &PgPool, id: i64) -> Result<User, AppError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Public profile of any active user.
pub async fn get_profile(State(pool): State<PgPool>, Path(id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    let sql = format!("SELECT {PUBLIC_PROFILE_COLUMNS} FROM users WHERE id = $1 AND is_active");
    let profile = sqlx::query_as::<_, PublicProfile>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(profile))
}

/// Partial update of the caller's own profile.
///
/// Changing the phone number clears `phone_verified`.
pub async fn update_me(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = fetch_user(&pool, user.id).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE users SET updated_at = NOW()");

    if let Some(first_name) = &payload.first_name {
        qb.push(", first_name = ").push_bind(first_name.trim());
    }
    if let Some(last_name) = &payload.last_name {
        qb.push(", last_name = ").push_bind(last_name.trim());
    }
    if let Some(raw) = &payload.phone {
        let phone = if raw.trim().is_empty() {
            None
        } else {
            Some(normalize_phone(raw).ok_or_else(|| AppError::BadRequest("Invalid phone number".to_string()))?)
        };
        if phone != current.phone {
            qb.push(", phone = ").push_bind(phone);
            qb.push(", phone_verified = FALSE");
        }
    }
    if let Some(bio) = &payload.bio {
        qb.push(", bio = ").push_bind(bio);
    }
    if let Some(county) = &payload.county {
        qb.push(", county = ").push_bind(county);
    }
    if let Some(constituency) = &payload.constituency {
        qb.push(", constituency = ").push_bind(constituency);
    }
    if let Some(ward) = &payload.ward {
        qb.push(", ward = ").push_bind(ward);
    }

    qb.push(" WHERE id = ").push_bind(user.id);
    qb.push(format!(" RETURNING {USER_COLUMNS}"));

    let updated: User = qb.build_query_as().fetch_one(&pool).await?;
    Ok(Json(updated))
}

/// Replaces the caller's avatar (multipart field `file`, images only).
pub async fn upload_avatar(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let file = read_single(&mut multipart, "file", Accept::Images, state.config.max_upload_bytes).await?;
    let stored = store(state.storage.as_ref(), "avatars", file).await?;

    let previous: Option<String> =
        sqlx::query_scalar("SELECT avatar_url FROM users WHERE id = $1").bind(user.id).fetch_one(&state.pool).await?;

    sqlx::query("UPDATE users SET avatar_url = $1, updated_at = NOW() WHERE id = $2")
        .bind(&stored.url)
        .bind(user.id)
        .execute(&state.pool)
        .await?;

    discard(state.storage.as_ref(), previous.as_deref()).await;

    Ok(Json(json!({ "avatar_url": stored.url })))
}

/// Deactivates the caller's account and revokes their tokens.
pub async fn deactivate_me(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    sqlx::query(
        "UPDATE users SET is_active = FALSE, token_version = token_version + 1, updated_at = NOW() WHERE id = $1",
    )
    .bind(user.id)
    .execute(&pool)
    .await?;

    tracing::info!(user_id = user.id, "account deactivated");

    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(json!({ "message": "Account deactivated" })),
    ))
}

/// Pushes the name/email search and role filter shared by user listings.
pub(crate) fn push_user_filters<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    q: Option<&'a str>,
    role: Option<crate::models::user::Role>,
) {
    if let Some(q) = q.map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{q}%");
        qb.push(" AND ((first_name || ' ' || last_name) ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(role) = role {
        qb.push(" AND role = ").push_bind(role);
    }
}

/// Finds active users by name or email, e.g. to start a conversation.
pub async fn search(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<UserSearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE is_active AND id <> ");
    count.push_bind(user.id);
    push_user_filters(&mut count, params.q.as_deref(), params.role);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
        "SELECT {PUBLIC_PROFILE_COLUMNS} FROM users WHERE is_active AND id <> "
    ));
    qb.push_bind(user.id);
    push_user_filters(&mut qb, params.q.as_deref(), params.role);
    qb.push(" ORDER BY first_name, last_name LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let users: Vec<PublicProfile> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(users, page, total)))
}
