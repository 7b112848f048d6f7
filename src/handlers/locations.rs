use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::error::AppError;

/// Distinct counties, alphabetical.
pub async fn counties(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let counties: Vec<String> = sqlx::query_scalar("SELECT DISTINCT county FROM locations ORDER BY county")
        .fetch_all(&pool)
        .await?;
    Ok(Json(counties))
}

pub async fn constituencies(
    State(pool): State<PgPool>,
    Path(county): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let constituencies: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT constituency FROM locations \
         WHERE LOWER(county) = LOWER($1) AND constituency IS NOT NULL ORDER BY constituency",
    )
    .bind(county.trim())
    .fetch_all(&pool)
    .await?;
    Ok(Json(constituencies))
}

pub async fn wards(
    State(pool): State<PgPool>,
    Path(constituency): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let wards: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT ward FROM locations \
         WHERE LOWER(constituency) = LOWER($1) AND ward IS NOT NULL ORDER BY ward",
    )
    .bind(constituency.trim())
    .fetch_all(&pool)
    .await?;
    Ok(Json(wards))
}
