use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        pagination::{Page, PageParams},
        survey::{
            Answer, CreateSurveyRequest, SURVEY_SELECT, SubmitSurveyResponse, Survey, SurveyResults, tally,
            validate_answers,
        },
        notification::{NewNotification, NotificationKind},
        user::Role,
    },
    services::notifier::{self, Recipients},
    state::AppState,
    utils::{html::plain_text, jwt::AuthUser},
};

async fn fetch_survey(pool: &PgPool, id: i64) -> Result<Survey, AppError> {
    let sql = format!("{SURVEY_SELECT} WHERE s.id = $1");
    sqlx::query_as::<_, Survey>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Survey not found".to_string()))
}

/// Verified representatives and organizations, or admins.
fn can_publish(user: &AuthUser) -> bool {
    user.is_admin() || (matches!(user.role, Role::Representative | Role::Organization) && user.is_verified)
}

pub async fn create_survey(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateSurveyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !can_publish(&user) {
        return Err(AppError::Forbidden(
            "Only verified representatives and organizations can create surveys".to_string(),
        ));
    }
    payload.validate()?;
    if payload.closes_at.is_some_and(|closes| closes <= Utc::now()) {
        return Err(AppError::BadRequest("closes_at must be in the future".to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO surveys (creator_id, title, description, questions, closes_at) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user.id)
    .bind(plain_text(&payload.title))
    .bind(payload.description.as_deref().map(plain_text))
    .bind(SqlJson(&payload.questions))
    .bind(payload.closes_at)
    .fetch_one(&pool)
    .await?;

    tracing::info!(survey_id = id, creator_id = user.id, "survey created");
    Ok((StatusCode::CREATED, Json(fetch_survey(&pool, id).await?)))
}

/// Surveys still accepting responses, newest first.
pub async fn list_open_surveys(
    State(pool): State<PgPool>,
    Query(page): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    const OPEN: &str = " WHERE s.is_open AND (s.closes_at IS NULL OR s.closes_at > NOW())";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM surveys s{OPEN}"))
        .fetch_one(&pool)
        .await?;

    let sql = format!("{SURVEY_SELECT}{OPEN} ORDER BY s.created_at DESC, s.id DESC LIMIT $1 OFFSET $2");
    let surveys = sqlx::query_as::<_, Survey>(&sql)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&pool)
        .await?;

    Ok(Json(Page::new(surveys, page, total)))
}

pub async fn get_survey(State(pool): State<PgPool>, Path(id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_survey(&pool, id).await?))
}

pub async fn submit_response(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<SubmitSurveyResponse>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_survey(&pool, id).await?;
    if !survey.accepts_responses(Utc::now()) {
        return Err(AppError::BadRequest("Survey is closed".to_string()));
    }
    validate_answers(&survey.questions, &payload.answers).map_err(AppError::BadRequest)?;

    let response_id: i64 = sqlx::query_scalar(
        "INSERT INTO survey_responses (survey_id, respondent_id, answers) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(id)
    .bind(user.id)
    .bind(SqlJson(&payload.answers))
    .fetch_one(&pool)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("You have already responded to this survey".to_string()),
        other => other,
    })?;

    Ok((StatusCode::CREATED, Json(json!({ "id": response_id, "survey_id": id }))))
}

/// Per-question tallies. Creator or admin only.
pub async fn survey_results(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_survey(&pool, id).await?;
    if !user.can_manage(survey.creator_id) {
        return Err(AppError::Forbidden("Only the survey creator can view results".to_string()));
    }

    let rows: Vec<SqlJson<HashMap<String, Answer>>> =
        sqlx::query_scalar("SELECT answers FROM survey_responses WHERE survey_id = $1")
            .bind(id)
            .fetch_all(&pool)
            .await?;
    let responses: Vec<HashMap<String, Answer>> = rows.into_iter().map(|row| row.0).collect();

    Ok(Json(SurveyResults {
        survey_id: id,
        responses: responses.len() as i64,
        questions: tally(&survey.questions, &responses),
    }))
}

pub async fn close_survey(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let survey = fetch_survey(&state.pool, id).await?;
    if !user.can_manage(survey.creator_id) {
        return Err(AppError::Forbidden("Only the survey creator can close it".to_string()));
    }
    if !survey.is_open {
        return Ok(Json(survey));
    }

    sqlx::query("UPDATE surveys SET is_open = FALSE WHERE id = $1")
        .bind(id)
        .execute(&state.pool)
        .await?;

    let respondents: Vec<i64> =
        sqlx::query_scalar("SELECT respondent_id FROM survey_responses WHERE survey_id = $1")
            .bind(id)
            .fetch_all(&state.pool)
            .await?;
    if !respondents.is_empty() {
        let notification = NewNotification::new(
            NotificationKind::Survey,
            "Survey closed",
            format!("\"{}\" is no longer accepting responses. Thanks for taking part.", survey.title),
        )
        .link(format!("/surveys/{id}"))
        .data(json!({ "survey_id": id }));
        if let Err(e) =
            notifier::notify_many(&state.pool, &state.hub, Recipients::Ids(&respondents), notification).await
        {
            tracing::warn!(survey_id = id, "survey closing fan-out failed: {e}");
        }
    }

    tracing::info!(survey_id = id, respondents = respondents.len(), "survey closed");
    Ok(Json(fetch_survey(&state.pool, id).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, is_verified: bool) -> AuthUser {
        AuthUser {
            id: 1,
            role,
            is_verified,
        }
    }

    #[test]
    fn only_verified_publishers_create_surveys() {
        assert!(can_publish(&user(Role::Representative, true)));
        assert!(can_publish(&user(Role::Organization, true)));
        assert!(can_publish(&user(Role::Admin, false)));
        assert!(!can_publish(&user(Role::Representative, false)));
        assert!(!can_publish(&user(Role::Citizen, true)));
    }
}
