use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        notification::{NOTIFICATION_COLUMNS, Notification, NotificationListParams},
        pagination::{Page, PageParams},
    },
    utils::jwt::AuthUser,
};

/// The caller's notifications, newest first. `?unread=true` narrows to
/// unread ones.
pub async fn list_notifications(
    State(pool): State<PgPool>,
    user: AuthUser,
    Query(params): Query<NotificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE recipient_id = ").push_bind(user.id);
        if params.unread {
            qb.push(" AND NOT is_read");
        }
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM notifications");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications"));
    push_filters(&mut qb);
    qb.push(" ORDER BY created_at DESC, id DESC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let notifications: Vec<Notification> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(notifications, page, total)))
}

pub async fn unread_count(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read")
        .bind(user.id)
        .fetch_one(&pool)
        .await?;
    Ok(Json(json!({ "count": count })))
}

/// Marks one notification read. Other users' notifications look missing.
pub async fn mark_read(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sql = format!(
        "UPDATE notifications SET is_read = TRUE, read_at = COALESCE(read_at, NOW()) \
         WHERE id = $1 AND recipient_id = $2 RETURNING {NOTIFICATION_COLUMNS}"
    );
    let notification = sqlx::query_as::<_, Notification>(&sql)
        .bind(id)
        .bind(user.id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

    Ok(Json(notification))
}

pub async fn mark_all_read(State(pool): State<PgPool>, user: AuthUser) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = TRUE, read_at = NOW() WHERE recipient_id = $1 AND NOT is_read",
    )
    .bind(user.id)
    .execute(&pool)
    .await?;

    Ok(Json(json!({ "updated": result.rows_affected() })))
}

pub async fn delete_notification(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND recipient_id = $2")
        .bind(id)
        .bind(user.id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
