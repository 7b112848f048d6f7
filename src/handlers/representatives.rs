use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        pagination::{Page, PageParams},
        representative::{
            CreateRepresentativeRequest, REPRESENTATIVE_SELECT, Representative, RepresentativeListParams,
            UpdateRepresentativeRequest,
        },
        verification::{VerificationStatus, VerificationSubject},
    },
    state::AppState,
    utils::jwt::{AuthUser, MaybeUser},
};

use super::verification::{open_request, store_documents};

pub(crate) async fn fetch_representative(pool: &PgPool, id: i64) -> Result<Representative, AppError> {
    let sql = format!("{REPRESENTATIVE_SELECT} WHERE r.id = $1");
    sqlx::query_as::<_, Representative>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Representative not found".to_string()))
}

/// The caller's own representative profile.
pub(crate) async fn own_profile(pool: &PgPool, user_id: i64) -> Result<Representative, AppError> {
    let sql = format!("{REPRESENTATIVE_SELECT} WHERE r.user_id = $1");
    sqlx::query_as::<_, Representative>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("You do not have a representative profile".to_string()))
}

/// Only the organization's owner (or an admin) may link a profile to it;
/// everyone else is added through the organization's member list.
async fn ensure_may_link(pool: &PgPool, user: &AuthUser, organization_id: i64) -> Result<(), AppError> {
    let owner_id: i64 = sqlx::query_scalar("SELECT owner_id FROM organizations WHERE id = $1")
        .bind(organization_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))?;
    if !user.can_manage(owner_id) {
        return Err(AppError::Forbidden(
            "Only the organization owner can add representatives to it".to_string(),
        ));
    }
    Ok(())
}

/// Creates the caller's representative profile. One per user.
pub async fn create_representative(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateRepresentativeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.check_jurisdiction().map_err(|msg| AppError::BadRequest(msg.to_string()))?;
    if let Some(organization_id) = payload.organization_id {
        ensure_may_link(&pool, &user, organization_id).await?;
    }

    let mut tx = pool.begin().await?;

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO representatives
            (user_id, organization_id, position, level, county, constituency, ward, party, bio)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(payload.organization_id)
    .bind(payload.position.trim())
    .bind(payload.level)
    .bind(&payload.county)
    .bind(&payload.constituency)
    .bind(&payload.ward)
    .bind(&payload.party)
    .bind(&payload.bio)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("You already have a representative profile".to_string()),
        other => other,
    })?;

    sqlx::query("UPDATE users SET role = 'representative', updated_at = NOW() WHERE id = $1 AND role <> 'admin'")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(representative_id = id, user_id = user.id, "representative profile created");
    let created = fetch_representative(&pool, id).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Approved representatives, filtered by area, level or name.
pub async fn list_representatives(
    State(pool): State<PgPool>,
    Query(params): Query<RepresentativeListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE r.status = 'approved' AND u.is_active");
        for (column, value) in [
            ("r.county", &params.county),
            ("r.constituency", &params.constituency),
            ("r.ward", &params.ward),
        ] {
            if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
                qb.push(format!(" AND LOWER({column}) = LOWER("))
                    .push_bind(value.trim().to_string())
                    .push(")");
            }
        }
        if let Some(level) = params.level {
            qb.push(" AND r.level = ").push_bind(level);
        }
        if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{q}%");
            qb.push(" AND ((u.first_name || ' ' || u.last_name) ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR r.position ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    };

    let mut count: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM representatives r JOIN users u ON u.id = r.user_id");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(REPRESENTATIVE_SELECT);
    push_filters(&mut qb);
    qb.push(" ORDER BY u.last_name, u.first_name LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let representatives: Vec<Representative> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(representatives, page, total)))
}

/// A single profile. Unverified profiles are only visible to their owner
/// and admins.
pub async fn get_representative(
    State(pool): State<PgPool>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let representative = fetch_representative(&pool, id).await?;

    let visible = representative.status == VerificationStatus::Approved
        || viewer.as_ref().is_some_and(|v| v.can_manage(representative.user_id));
    if !visible {
        return Err(AppError::NotFound("Representative not found".to_string()));
    }
    Ok(Json(representative))
}

/// Partial update of the caller's own profile.
pub async fn update_my_profile(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<UpdateRepresentativeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let current = own_profile(&pool, user.id).await?;
    payload
        .check_jurisdiction(&current)
        .map_err(|msg| AppError::BadRequest(msg.to_string()))?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE representatives SET updated_at = NOW()");
    if let Some(position) = &payload.position {
        qb.push(", position = ").push_bind(position.trim());
    }
    if let Some(party) = &payload.party {
        qb.push(", party = ").push_bind(party);
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
    qb.push(" WHERE id = ").push_bind(current.id);
    qb.build().execute(&pool).await?;

    Ok(Json(fetch_representative(&pool, current.id).await?))
}

/// Appends verification documents to the caller's profile and opens a
/// verification request for it.
pub async fn upload_documents(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let profile = own_profile(&state.pool, user.id).await?;
    if profile.status == VerificationStatus::Approved {
        return Err(AppError::Conflict("Your profile is already verified".to_string()));
    }

    let documents = store_documents(&state, &mut multipart, "verification/representatives").await?;

    let mut tx = state.pool.begin().await?;
    let request = open_request(&mut tx, user.id, VerificationSubject::Representative, profile.id, &documents).await?;
    sqlx::query(
        "UPDATE representatives SET verification_documents = verification_documents || $1, \
         status = 'pending', updated_at = NOW() WHERE id = $2",
    )
    .bind(SqlJson(&documents))
    .bind(profile.id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(representative_id = profile.id, request_id = request.id, "representative documents submitted");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "request_id": request.id, "documents": documents })),
    ))
}
