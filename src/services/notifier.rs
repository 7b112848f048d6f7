//! Persist-then-push notifications.
//!
//! Every notification is stored first; the realtime push is best-effort and
//! only reaches users with a live socket. [`notify`] only logs failures,
//! fan-outs return them so the caller decides.

use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{
        notification::{NOTIFICATION_COLUMNS, NewNotification, Notification},
        user::Role,
    },
    services::realtime::{Hub, ServerEvent},
};

/// Stores a notification for `recipient_id` and pushes it over the socket.
pub async fn notify(pool: &PgPool, hub: &Hub, recipient_id: i64, notification: NewNotification) -> Option<Notification> {
    match insert(pool, recipient_id, notification).await {
        Ok(stored) => {
            hub.send_to(
                recipient_id,
                ServerEvent::Notification {
                    notification: stored.clone(),
                },
            )
            .await;
            Some(stored)
        }
        Err(e) => {
            tracing::warn!(recipient_id, "failed to store notification: {e}");
            None
        }
    }
}

async fn insert(pool: &PgPool, recipient_id: i64, n: NewNotification) -> Result<Notification, AppError> {
    let sql = format!(
        "INSERT INTO notifications (recipient_id, kind, title, body, link, data) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING {NOTIFICATION_COLUMNS}"
    );
    let stored = sqlx::query_as::<_, Notification>(&sql)
        .bind(recipient_id)
        .bind(n.kind)
        .bind(&n.title)
        .bind(&n.body)
        .bind(&n.link)
        .bind(&n.data)
        .fetch_one(pool)
        .await?;
    Ok(stored)
}

/// Recipient selection for [`notify_many`].
#[derive(Debug, Clone)]
pub enum Recipients<'a> {
    /// Active users, optionally restricted to one role and to an area
    /// column (`county`, `constituency`, `ward`) equal to a value.
    Active {
        role: Option<Role>,
        area: Option<(&'static str, &'a str)>,
        exclude: Option<i64>,
    },
    /// An explicit list of user ids.
    Ids(&'a [i64]),
}

/// Stores one notification per selected recipient with a single
/// `INSERT ... SELECT` on `conn`. Nothing is pushed; hand the rows to
/// [`push_all`] once the surrounding transaction has committed.
pub async fn store_many(
    conn: &mut PgConnection,
    recipients: Recipients<'_>,
    notification: &NewNotification,
) -> Result<Vec<Notification>, AppError> {
    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO notifications (recipient_id, kind, title, body, link, data) SELECT u.id, ");
    qb.push_bind(notification.kind);
    qb.push(", ");
    qb.push_bind(&notification.title);
    qb.push(", ");
    qb.push_bind(&notification.body);
    qb.push(", ");
    qb.push_bind(&notification.link);
    qb.push(", ");
    qb.push_bind(&notification.data);
    qb.push(" FROM users u WHERE u.is_active = TRUE");

    match recipients {
        Recipients::Active { role, area, exclude } => {
            if let Some(role) = role {
                qb.push(" AND u.role = ");
                qb.push_bind(role);
            }
            if let Some((column, value)) = area {
                // Column names come from a closed set, never from input.
                qb.push(format!(" AND LOWER(u.{column}) = LOWER("));
                qb.push_bind(value);
                qb.push(")");
            }
            if let Some(id) = exclude {
                qb.push(" AND u.id <> ");
                qb.push_bind(id);
            }
        }
        Recipients::Ids(ids) => {
            qb.push(" AND u.id = ANY(");
            qb.push_bind(ids);
            qb.push(")");
        }
    }
    qb.push(format!(" RETURNING {NOTIFICATION_COLUMNS}"));

    Ok(qb.build_query_as().fetch_all(&mut *conn).await?)
}

/// Pushes stored notifications to whoever is online.
pub async fn push_all(hub: &Hub, stored: Vec<Notification>) {
    for n in stored {
        let recipient_id = n.recipient_id;
        hub.send_to(recipient_id, ServerEvent::Notification { notification: n }).await;
    }
}

/// [`store_many`] outside a transaction, followed by [`push_all`].
/// Returns the number of notifications created.
pub async fn notify_many(
    pool: &PgPool,
    hub: &Hub,
    recipients: Recipients<'_>,
    notification: NewNotification,
) -> Result<u64, AppError> {
    let mut conn = pool.acquire().await?;
    let stored = store_many(&mut conn, recipients, &notification).await?;
    let count = stored.len() as u64;
    push_all(hub, stored).await;

    tracing::info!(count, "notifications fanned out");
    Ok(count)
}
