use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::phone::{
        CODE_TTL_MINUTES, CodeState, MAX_ATTEMPTS, PhoneVerification, SendCodeRequest, VerifyCodeRequest,
        code_expiry, generate_code,
    },
    services::sms::normalize_phone,
    state::AppState,
    utils::{
        hash::{hash_password, verify_password},
        jwt::AuthUser,
    },
};

const PHONE_VERIFICATION_COLUMNS: &str =
    "id, user_id, phone, code_hash, attempts, expires_at, consumed_at, created_at";

/// Sends a six digit code to the given phone, or the one on file.
///
/// Any earlier unconsumed code is replaced. One send per cooldown window.
pub async fn send_code(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SendCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let raw = match payload.phone {
        Some(phone) => phone,
        None => sqlx::query_scalar::<_, Option<String>>("SELECT phone FROM users WHERE id = $1")
            .bind(user.id)
            .fetch_one(&state.pool)
            .await?
            .ok_or_else(|| AppError::BadRequest("No phone number on file".to_string()))?,
    };
    let phone = normalize_phone(&raw).ok_or_else(|| AppError::BadRequest("Invalid phone number".to_string()))?;

    let code = generate_code();
    let code_hash = hash_password(&code)?;

    let mut tx = state.pool.begin().await?;

    // Serializes concurrent sends for one user, including the very first.
    sqlx::query("SELECT id FROM users WHERE id = $1 FOR UPDATE")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    let now = Utc::now();
    let sql = format!(
        "SELECT {PHONE_VERIFICATION_COLUMNS} FROM phone_verifications \
         WHERE user_id = $1 ORDER BY created_at DESC LIMIT 1"
    );
    let latest = sqlx::query_as::<_, PhoneVerification>(&sql)
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?;
    if let Some(wait) = latest.map(|v| v.cooldown_remaining(now)).filter(|wait| *wait > 0) {
        return Err(AppError::TooManyRequests(format!(
            "Please wait {wait} seconds before requesting another code"
        )));
    }

    let expires_at = code_expiry(now);
    sqlx::query("DELETE FROM phone_verifications WHERE user_id = $1 AND consumed_at IS NULL")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO phone_verifications (user_id, phone, code_hash, expires_at, created_at) \
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(user.id)
    .bind(&phone)
    .bind(&code_hash)
    .bind(expires_at)
    .bind(now)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    let body = format!("Your verification code is {code}. It expires in {CODE_TTL_MINUTES} minutes.");
    if let Err(e) = state.sms.send(&phone, &body).await {
        tracing::warn!(user_id = user.id, "failed to send verification sms: {e}");
    }

    tracing::info!(user_id = user.id, "phone verification code issued");
    Ok(Json(json!({
        "message": "Verification code sent",
        "phone": phone,
        "expires_at": expires_at,
    })))
}

/// Checks a code. Wrong guesses count against the code; success records
/// the phone as verified.
pub async fn verify_code(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = state.pool.begin().await?;

    let sql = format!(
        "SELECT {PHONE_VERIFICATION_COLUMNS} FROM phone_verifications \
         WHERE user_id = $1 AND consumed_at IS NULL ORDER BY created_at DESC LIMIT 1 FOR UPDATE"
    );
    let record = sqlx::query_as::<_, PhoneVerification>(&sql)
        .bind(user.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::BadRequest("No verification code has been requested".to_string()))?;

    match record.state(Utc::now()) {
        CodeState::Usable => {}
        CodeState::Expired => return Err(AppError::BadRequest("Verification code has expired".to_string())),
        CodeState::Exhausted => {
            return Err(AppError::BadRequest(
                "Too many attempts, request a new code".to_string(),
            ));
        }
        CodeState::Consumed => {
            return Err(AppError::BadRequest("No verification code has been requested".to_string()));
        }
    }

    if !verify_password(payload.code.trim(), &record.code_hash)? {
        sqlx::query("UPDATE phone_verifications SET attempts = attempts + 1 WHERE id = $1")
            .bind(record.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let remaining = (MAX_ATTEMPTS - record.attempts - 1).max(0);
        return Err(AppError::BadRequest(format!(
            "Invalid verification code, {remaining} attempts left"
        )));
    }

    sqlx::query("UPDATE phone_verifications SET consumed_at = NOW() WHERE id = $1")
        .bind(record.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE users SET phone = $1, phone_verified = TRUE, updated_at = NOW() WHERE id = $2")
        .bind(&record.phone)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(user_id = user.id, "phone verified");
    Ok(Json(json!({ "message": "Phone number verified", "phone": record.phone })))
}
