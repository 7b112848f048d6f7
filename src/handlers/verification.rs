use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        notification::{NewNotification, NotificationKind},
        pagination::{Page, PageParams},
        verification::{
            ReviewRequest, VERIFICATION_COLUMNS, VerificationDocument, VerificationListParams, VerificationRequest,
            VerificationStatus, VerificationSubject,
        },
    },
    services::{
        mailer::{send_best_effort, verification_decision_email},
        notifier,
    },
    state::AppState,
    utils::{
        jwt::AuthUser,
        upload::{Accept, read_files, store},
    },
};

/// Most documents accepted in one submission.
pub const MAX_DOCUMENTS: usize = 10;

/// Stores the `documents` (or `documents[]`) parts of a multipart body.
pub(crate) async fn store_documents(
    state: &AppState,
    multipart: &mut Multipart,
    folder: &str,
) -> Result<Vec<VerificationDocument>, AppError> {
    let files = read_files(
        multipart,
        &["documents", "documents[]", "file"],
        Accept::ImagesAndPdf,
        state.config.max_upload_bytes,
        MAX_DOCUMENTS,
    )
    .await?;

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let name = file.file_name.clone();
        let stored = store(state.storage.as_ref(), folder, file).await?;
        documents.push(VerificationDocument {
            name,
            url: stored.url,
            content_type: stored.content_type,
            uploaded_at: Utc::now(),
        });
    }
    Ok(documents)
}

/// Opens a pending request for `(subject, subject_id)`. At most one may be
/// pending at a time.
pub(crate) async fn open_request(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    subject: VerificationSubject,
    subject_id: i64,
    documents: &[VerificationDocument],
) -> Result<VerificationRequest, AppError> {
    let pending: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM verification_requests \
         WHERE subject = $1 AND subject_id = $2 AND status = 'pending')",
    )
    .bind(subject)
    .bind(subject_id)
    .fetch_one(&mut **tx)
    .await?;
    if pending {
        return Err(AppError::Conflict("A verification request is already pending".to_string()));
    }

    let sql = format!(
        "INSERT INTO verification_requests (user_id, subject, subject_id, documents) \
         VALUES ($1, $2, $3, $4) RETURNING {VERIFICATION_COLUMNS}"
    );
    let request = sqlx::query_as::<_, VerificationRequest>(&sql)
        .bind(user_id)
        .bind(subject)
        .bind(subject_id)
        .bind(SqlJson(documents))
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict("A verification request is already pending".to_string()),
            other => other,
        })?;
    Ok(request)
}

/// Admin queue, oldest first. Defaults to pending requests.
pub async fn list_verifications(
    State(pool): State<PgPool>,
    Query(params): Query<VerificationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);
    let status = params.status.unwrap_or(VerificationStatus::Pending);

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE status = ").push_bind(status);
        if let Some(subject) = params.subject {
            qb.push(" AND subject = ").push_bind(subject);
        }
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM verification_requests");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {VERIFICATION_COLUMNS} FROM verification_requests"));
    push_filters(&mut qb);
    qb.push(" ORDER BY created_at ASC, id ASC LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let requests: Vec<VerificationRequest> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(requests, page, total)))
}

async fn fetch_request(pool: &PgPool, id: i64) -> Result<VerificationRequest, AppError> {
    let sql = format!("SELECT {VERIFICATION_COLUMNS} FROM verification_requests WHERE id = $1");
    sqlx::query_as::<_, VerificationRequest>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Verification request not found".to_string()))
}

pub async fn get_verification(State(pool): State<PgPool>, Path(id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_request(&pool, id).await?))
}

/// Approves a pending request: the subject, the request and the user's
/// verified flag change in one transaction.
pub async fn approve_verification(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<i64>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // The body is optional when approving.
    let review: ReviewRequest = if body.is_empty() {
        ReviewRequest::default()
    } else {
        serde_json::from_slice(&body)?
    };
    review.validate()?;
    decide(&state, &admin, id, VerificationStatus::Approved, review.notes).await
}

/// Rejects a pending request. Notes are mandatory.
pub async fn reject_verification(
    State(state): State<AppState>,
    admin: AuthUser,
    Path(id): Path<i64>,
    Json(review): Json<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    review.validate()?;
    if review.notes.as_deref().is_none_or(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("Notes are required when rejecting".to_string()));
    }
    decide(&state, &admin, id, VerificationStatus::Rejected, review.notes).await
}

async fn decide(
    state: &AppState,
    admin: &AuthUser,
    id: i64,
    decision: VerificationStatus,
    notes: Option<String>,
) -> Result<Json<VerificationRequest>, AppError> {
    let mut tx = state.pool.begin().await?;

    // Lock the row so two reviewers cannot both decide it.
    let sql = format!("SELECT {VERIFICATION_COLUMNS} FROM verification_requests WHERE id = $1 FOR UPDATE");
    let request = sqlx::query_as::<_, VerificationRequest>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Verification request not found".to_string()))?;

    if !request.status.can_transition_to(decision) {
        return Err(AppError::Conflict(format!(
            "Request is already {}",
            format!("{:?}", request.status).to_lowercase()
        )));
    }

    let sql = format!(
        "UPDATE verification_requests SET status = $1, reviewer_id = $2, review_notes = $3, reviewed_at = NOW() \
         WHERE id = $4 RETURNING {VERIFICATION_COLUMNS}"
    );
    let updated = sqlx::query_as::<_, VerificationRequest>(&sql)
        .bind(decision)
        .bind(admin.id)
        .bind(&notes)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

    let subject_table = match request.subject {
        VerificationSubject::Representative => Some("representatives"),
        VerificationSubject::Organization => Some("organizations"),
        VerificationSubject::Citizen => None,
    };
    if let Some(table) = subject_table {
        sqlx::query(&format!("UPDATE {table} SET status = $1, updated_at = NOW() WHERE id = $2"))
            .bind(decision)
            .bind(request.subject_id)
            .execute(&mut *tx)
            .await?;
    }

    if decision == VerificationStatus::Approved {
        sqlx::query("UPDATE users SET is_verified = TRUE, updated_at = NOW() WHERE id = $1")
            .bind(request.user_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let approved = decision == VerificationStatus::Approved;
    tracing::info!(request_id = id, reviewer_id = admin.id, approved, "verification decided");

    let (title, body) = if approved {
        ("Verification approved", "Your verification request was approved.".to_string())
    } else {
        (
            "Verification rejected",
            format!("Your verification request was rejected: {}", notes.as_deref().unwrap_or_default()),
        )
    };
    notifier::notify(
        &state.pool,
        &state.hub,
        request.user_id,
        NewNotification::new(NotificationKind::Verification, title, body)
            .data(serde_json::json!({ "request_id": id, "status": decision })),
    )
    .await;

    let email: Result<String, sqlx::Error> = sqlx::query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(request.user_id)
        .fetch_one(&state.pool)
        .await;
    match email {
        Ok(email) => {
            let mailer = state.mailer.clone();
            let message = verification_decision_email(&email, approved, notes.as_deref());
            tokio::spawn(async move { send_best_effort(mailer.as_ref(), message).await });
        }
        Err(e) => tracing::warn!(user_id = request.user_id, "skipping decision email: {e}"),
    }

    Ok(Json(updated))
}
