use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        communication::{COMMUNICATION_SELECT, Communication, CreateCommunicationRequest},
        notification::{NewNotification, NotificationKind},
        pagination::{Page, PageParams},
        user::Role,
    },
    services::notifier::{self, Recipients},
    state::AppState,
    utils::{html::plain_text, jwt::AuthUser},
};

use super::citizen::area_of;

/// Publishes an announcement and notifies every active citizen in the
/// targeted area. Verified representatives and admins only.
///
/// The row, its notifications and `recipients_count` are written in one
/// transaction; sockets are only pushed to after it commits.
pub async fn create_communication(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateCommunicationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let allowed = user.is_admin() || (user.role == Role::Representative && user.is_verified);
    if !allowed {
        return Err(AppError::Forbidden(
            "Only verified representatives can publish communications".to_string(),
        ));
    }
    payload.validate()?;

    let title = plain_text(&payload.title);
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".to_string()));
    }
    let body = payload.body.trim();
    let target_area = payload.target().map(str::to_string);

    let mut tx = state.pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO communications (sender_id, title, body, audience, target_area) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(user.id)
    .bind(&title)
    .bind(body)
    .bind(payload.audience)
    .bind(&target_area)
    .fetch_one(&mut *tx)
    .await?;

    let notification = NewNotification::new(NotificationKind::Communication, title.clone(), body)
        .link(format!("/communications/{id}"))
        .data(json!({ "communication_id": id }));
    let stored = notifier::store_many(
        &mut tx,
        Recipients::Active {
            role: Some(Role::Citizen),
            area: payload.audience.area_column().zip(target_area.as_deref()),
            exclude: Some(user.id),
        },
        &notification,
    )
    .await?;
    let recipients = stored.len() as i64;

    sqlx::query("UPDATE communications SET recipients_count = $1 WHERE id = $2")
        .bind(recipients)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    notifier::push_all(&state.hub, stored).await;
    tracing::info!(communication_id = id, sender_id = user.id, recipients, "communication published");

    let sql = format!("{COMMUNICATION_SELECT} WHERE c.id = $1");
    let communication = sqlx::query_as::<_, Communication>(&sql)
        .bind(id)
        .fetch_one(&state.pool)
        .await?;
    Ok((StatusCode::CREATED, Json(communication)))
}

/// Communications addressed to everyone or to the caller's county,
/// constituency or ward, newest first.
pub async fn list_for_me(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let area = area_of(&pool, user.id).await?;

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE (c.audience = 'all'");
        for (audience, value) in [
            ("county", &area.county),
            ("constituency", &area.constituency),
            ("ward", &area.ward),
        ] {
            if let Some(value) = value {
                qb.push(format!(" OR (c.audience = '{audience}' AND LOWER(c.target_area) = LOWER("))
                    .push_bind(value.clone())
                    .push("))");
            }
        }
        qb.push(")");
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM communications c");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(COMMUNICATION_SELECT);
    push_filters(&mut qb);
    qb.push(" ORDER BY c.created_at DESC, c.id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let communications: Vec<Communication> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(communications, page, total)))
}

/// The caller's own communications.
pub async fn list_sent(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(page): Query<PageParams>,
) -> Result<impl IntoResponse, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM communications WHERE sender_id = $1")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;

    let sql = format!("{COMMUNICATION_SELECT} WHERE c.sender_id = $1 ORDER BY c.created_at DESC, c.id DESC LIMIT $2 OFFSET $3");
    let communications = sqlx::query_as::<_, Communication>(&sql)
        .bind(user.id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&pool)
        .await?;

    Ok(Json(Page::new(communications, page, total)))
}
