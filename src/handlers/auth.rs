// src/handlers/auth.rs

use axum::{
    Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::users::fetch_user,
    models::user::{
        ChangePasswordRequest, LoginRequest, LoginResponse, MeResponse, RegisterRequest, Role, USER_COLUMNS, User,
        normalize_email,
    },
    services::{mailer::{send_best_effort, welcome_email}, sms::normalize_phone},
    state::AppState,
    utils::{
        hash::{burn_verification, hash_password, verify_password},
        jwt::{AuthUser, clear_session_cookie, session_cookie, sign_jwt},
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created and the user object (excluding password).
#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let role = payload.role.unwrap_or(Role::Citizen);
    if role == Role::Admin {
        return Err(AppError::BadRequest("Cannot self-register as admin".to_string()));
    }

    let phone = match payload.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(raw) => Some(normalize_phone(raw).ok_or_else(|| AppError::BadRequest("Invalid phone number".to_string()))?),
        None => None,
    };

    let email = normalize_email(&payload.email);
    let hashed_password = hash_password(&payload.password)?;

    let sql = format!(
        "INSERT INTO users (first_name, last_name, email, phone, password, role, county, constituency, ward) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {USER_COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(payload.first_name.trim())
        .bind(payload.last_name.trim())
        .bind(&email)
        .bind(&phone)
        .bind(&hashed_password)
        .bind(role)
        .bind(&payload.county)
        .bind(&payload.constituency)
        .bind(&payload.ward)
        .fetch_one(&state.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!("Email '{email}' is already registered")),
            other => other,
        })?;

    tracing::info!(user_id = user.id, role = role.as_str(), "user registered");

    let mailer = state.mailer.clone();
    let email = welcome_email(&user.email, &user.first_name);
    tokio::spawn(async move { send_best_effort(mailer.as_ref(), email).await });

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// The token is also set as an HttpOnly cookie. Unknown emails and wrong
/// passwords share one message.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account deactivated")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(normalize_email(&payload.email))
        .fetch_optional(&state.pool)
        .await?;

    let invalid = || AppError::AuthError("Invalid email or password".to_string());

    let Some(user) = user else {
        burn_verification(&payload.password);
        return Err(invalid());
    };

    if !verify_password(&payload.password, &user.password)? {
        return Err(invalid());
    }

    if !user.is_active {
        return Err(AppError::Forbidden("Account is deactivated".to_string()));
    }

    let token = sign_jwt(
        user.id,
        user.role,
        user.token_version,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;
    let cookie = session_cookie(&token, state.config.jwt_expiration);

    tracing::info!(user_id = user.id, "user logged in");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            user,
        }),
    ))
}

/// Clears the session cookie. Tokens already handed out stay valid until
/// they expire; use `logout-all` to revoke them.
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(json!({ "message": "Logged out" })),
    )
}

/// Revokes every token issued to the caller.
pub async fn logout_all(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    sqlx::query("UPDATE users SET token_version = token_version + 1, updated_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&pool)
        .await?;

    tracing::info!(user_id = user.id, "all sessions revoked");

    Ok((
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(json!({ "message": "Logged out from all sessions" })),
    ))
}

/// Current user with a few counters for the header badges.
pub async fn me(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let me = fetch_user(&pool, user.id).await?;

    let (posts_count, unread_notifications, unread_messages) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE author_id = $1 AND deleted_at IS NULL),
            (SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read),
            (SELECT COUNT(*) FROM messages
              WHERE recipient_id = $1 AND status <> 'read' AND NOT deleted_by_recipient)
        "#,
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await?;

    Ok(Json(MeResponse {
        user: me,
        posts_count,
        unread_notifications,
        unread_messages,
    }))
}

/// Changes the password and revokes older tokens. A fresh token for the
/// current session is returned (and set as cookie).
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let current = fetch_user(&state.pool, user.id).await?;
    if !verify_password(&payload.current_password, &current.password)? {
        return Err(AppError::AuthError("Current password is incorrect".to_string()));
    }

    let hashed_password = hash_password(&payload.new_password)?;
    let version: i32 = sqlx::query_scalar(
        "UPDATE users SET password = $1, token_version = token_version + 1, updated_at = NOW() \
         WHERE id = $2 RETURNING token_version",
    )
    .bind(&hashed_password)
    .bind(user.id)
    .fetch_one(&state.pool)
    .await?;

    let token = sign_jwt(
        user.id,
        current.role,
        version,
        &state.config.jwt_secret,
        state.config.jwt_expiration,
    )?;
    let cookie = session_cookie(&token, state.config.jwt_expiration);

    tracing::info!(user_id = user.id, "password changed");

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "message": "Password updated", "token": token })),
    ))
}
