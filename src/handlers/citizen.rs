use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        interaction::{
            CreateInteractionRequest, INTERACTION_SELECT, Interaction, InteractionListParams, InteractionRoleView,
            InteractionStatus, RespondInteractionRequest,
        },
        notification::{NewNotification, NotificationKind},
        pagination::{Page, PageParams},
        representative::{REPRESENTATIVE_SUMMARY_SELECT, RepresentativeSummary},
    },
    services::notifier,
    state::AppState,
    utils::{html::plain_text, jwt::AuthUser},
};

use super::representatives::own_profile;

/// The administrative area a user registered in.
#[derive(Debug, Clone, Default, FromRow)]
pub(crate) struct Area {
    pub county: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
}

pub(crate) async fn area_of(pool: &PgPool, user_id: i64) -> Result<Area, AppError> {
    sqlx::query_as::<_, Area>("SELECT county, constituency, ward FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Approved representatives whose ward, constituency or county matches
/// `area`, ward-level matches first.
async fn representatives_for(pool: &PgPool, area: &Area) -> Result<Vec<RepresentativeSummary>, AppError> {
    if area.county.is_none() && area.constituency.is_none() && area.ward.is_none() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(REPRESENTATIVE_SUMMARY_SELECT);
    qb.push(" WHERE r.status = 'approved' AND u.is_active AND (FALSE");
    let columns = [
        ("r.ward", &area.ward),
        ("r.constituency", &area.constituency),
        ("r.county", &area.county),
    ];
    for (column, value) in columns {
        if let Some(value) = value {
            qb.push(format!(" OR LOWER({column}) = LOWER("))
                .push_bind(value.clone())
                .push(")");
        }
    }
    qb.push(") ORDER BY CASE");
    for (rank, (column, value)) in columns.iter().enumerate() {
        if let Some(value) = value {
            qb.push(format!(" WHEN LOWER({column}) = LOWER("))
                .push_bind((*value).clone())
                .push(format!(") THEN {rank}"));
        }
    }
    qb.push(" ELSE 3 END, u.last_name, u.first_name");

    Ok(qb.build_query_as().fetch_all(pool).await?)
}

#[derive(Debug, FromRow)]
struct DashboardCounts {
    posts: i64,
    votes: i64,
    open_interactions: i64,
    unread_notifications: i64,
}

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub posts: i64,
    pub votes: i64,
    pub open_interactions: i64,
    pub unread_notifications: i64,
    pub representatives: Vec<RepresentativeSummary>,
}

pub async fn dashboard(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let counts = sqlx::query_as::<_, DashboardCounts>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM posts WHERE author_id = $1 AND deleted_at IS NULL) AS posts,
            (SELECT COUNT(*) FROM post_votes WHERE user_id = $1) AS votes,
            (SELECT COUNT(*) FROM interactions WHERE citizen_id = $1 AND status <> 'closed') AS open_interactions,
            (SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read) AS unread_notifications
        "#,
    )
    .bind(user.id)
    .fetch_one(&pool)
    .await?;

    let area = area_of(&pool, user.id).await?;
    let representatives = representatives_for(&pool, &area).await?;

    Ok(Json(Dashboard {
        posts: counts.posts,
        votes: counts.votes,
        open_interactions: counts.open_interactions,
        unread_notifications: counts.unread_notifications,
        representatives,
    }))
}

pub async fn my_representatives(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let area = area_of(&pool, user.id).await?;
    Ok(Json(representatives_for(&pool, &area).await?))
}

async fn fetch_interaction(pool: &PgPool, id: i64) -> Result<Interaction, AppError> {
    let sql = format!("{INTERACTION_SELECT} WHERE i.id = $1");
    sqlx::query_as::<_, Interaction>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Interaction not found".to_string()))
}

/// Raises an inquiry, complaint, feedback or meeting request with an
/// approved representative.
pub async fn create_interaction(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateInteractionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let representative_user: i64 = sqlx::query_scalar(
        "SELECT user_id FROM representatives WHERE id = $1 AND status = 'approved'",
    )
    .bind(payload.representative_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Representative not found".to_string()))?;

    if representative_user == user.id {
        return Err(AppError::BadRequest("You cannot open an interaction with yourself".to_string()));
    }

    let subject = plain_text(&payload.subject);
    if subject.is_empty() {
        return Err(AppError::BadRequest("Subject cannot be empty".to_string()));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO interactions (citizen_id, representative_id, kind, subject, body) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user.id)
    .bind(payload.representative_id)
    .bind(payload.kind)
    .bind(&subject)
    .bind(plain_text(&payload.body))
    .fetch_one(&state.pool)
    .await?;

    let interaction = fetch_interaction(&state.pool, id).await?;

    notifier::notify(
        &state.pool,
        &state.hub,
        representative_user,
        NewNotification::new(
            NotificationKind::Interaction,
            "New interaction",
            format!("{} wrote to you: {}", interaction.citizen_name, interaction.subject),
        )
        .link(format!("/interactions/{id}"))
        .data(json!({ "interaction_id": id })),
    )
    .await;

    tracing::info!(interaction_id = id, citizen_id = user.id, "interaction opened");
    Ok((StatusCode::CREATED, Json(interaction)))
}

/// Interactions the caller raised, or with `?as=representative`, the ones
/// addressed to the caller's representative profile.
pub async fn list_interactions(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<InteractionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let (column, owner) = match params.view {
        InteractionRoleView::Citizen => ("i.citizen_id", user.id),
        InteractionRoleView::Representative => ("i.representative_id", own_profile(&pool, user.id).await?.id),
    };

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(format!(" WHERE {column} = ")).push_bind(owner);
        if let Some(status) = params.status {
            qb.push(" AND i.status = ").push_bind(status);
        }
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM interactions i");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(INTERACTION_SELECT);
    push_filters(&mut qb);
    qb.push(" ORDER BY i.updated_at DESC, i.id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let interactions: Vec<Interaction> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(interactions, page, total)))
}

/// The addressed representative answers. A later answer replaces the
/// earlier one until the interaction is closed.
pub async fn respond_interaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<RespondInteractionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let interaction = fetch_interaction(&state.pool, id).await?;

    if interaction.representative_user_id != user.id {
        return Err(AppError::Forbidden("Only the representative can respond".to_string()));
    }
    if !interaction.status.can_respond() {
        return Err(AppError::BadRequest("Interaction is closed".to_string()));
    }

    sqlx::query(
        "UPDATE interactions SET status = 'responded', response = $1, responded_at = NOW(), updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(plain_text(&payload.response))
    .bind(id)
    .execute(&state.pool)
    .await?;

    let updated = fetch_interaction(&state.pool, id).await?;

    notifier::notify(
        &state.pool,
        &state.hub,
        updated.citizen_id,
        NewNotification::new(
            NotificationKind::Interaction,
            "Your representative responded",
            format!("{} responded to \"{}\"", updated.representative_name, updated.subject),
        )
        .link(format!("/interactions/{id}"))
        .data(json!({ "interaction_id": id })),
    )
    .await;

    Ok(Json(updated))
}

/// Either party closes the interaction.
pub async fn close_interaction(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let interaction = fetch_interaction(&pool, id).await?;

    if interaction.citizen_id != user.id && interaction.representative_user_id != user.id {
        return Err(AppError::Forbidden("You are not part of this interaction".to_string()));
    }
    if interaction.status == InteractionStatus::Closed {
        return Ok(Json(interaction));
    }

    sqlx::query("UPDATE interactions SET status = 'closed', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(Json(fetch_interaction(&pool, id).await?))
}
