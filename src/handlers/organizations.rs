use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        organization::{
            AddMemberRequest, CreateOrganizationRequest, ORGANIZATION_COLUMNS, Organization, OrganizationDetail,
            OrganizationListParams, UpdateOrganizationRequest,
        },
        pagination::{Page, PageParams},
        representative::{REPRESENTATIVE_SUMMARY_SELECT, RepresentativeSummary},
        verification::{VerificationStatus, VerificationSubject},
    },
    state::AppState,
    utils::{
        jwt::{AuthUser, MaybeUser},
        upload::{Accept, discard, read_single, store},
    },
};

use super::verification::{open_request, store_documents};

pub(crate) async fn fetch_organization(pool: &PgPool, id: i64) -> Result<Organization, AppError> {
    let sql = format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE id = $1");
    sqlx::query_as::<_, Organization>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Organization not found".to_string()))
}

fn ensure_manager(user: &AuthUser, org: &Organization) -> Result<(), AppError> {
    if user.can_manage(org.owner_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Only the organization owner can do this".to_string()))
    }
}

/// Registers an organization owned by the caller.
pub async fn create_organization(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let mut tx = pool.begin().await?;

    let sql = format!(
        "INSERT INTO organizations \
            (owner_id, name, registration_number, org_type, description, contact_email, contact_phone, website, county) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {ORGANIZATION_COLUMNS}"
    );
    let org = sqlx::query_as::<_, Organization>(&sql)
        .bind(user.id)
        .bind(payload.name.trim())
        .bind(payload.registration_number.trim())
        .bind(payload.org_type)
        .bind(&payload.description)
        .bind(&payload.contact_email)
        .bind(&payload.contact_phone)
        .bind(&payload.website)
        .bind(&payload.county)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict(_) => AppError::Conflict(format!(
                "Registration number '{}' is already in use",
                payload.registration_number.trim()
            )),
            other => other,
        })?;

    // Owners act as organization accounts from now on.
    sqlx::query("UPDATE users SET role = 'organization', updated_at = NOW() WHERE id = $1 AND role <> 'admin'")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(organization_id = org.id, owner_id = user.id, "organization registered");
    Ok((StatusCode::CREATED, Json(org)))
}

/// Lists organizations. Only admins see unapproved ones.
pub async fn list_organizations(
    State(pool): State<PgPool>,
    MaybeUser(viewer): MaybeUser,
    Query(params): Query<OrganizationListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);
    let is_admin = viewer.as_ref().is_some_and(AuthUser::is_admin);
    let status = if is_admin { params.status } else { Some(VerificationStatus::Approved) };

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        if let Some(status) = status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(org_type) = params.org_type {
            qb.push(" AND org_type = ").push_bind(org_type);
        }
        if let Some(county) = params.county.as_deref().filter(|c| !c.is_empty()) {
            qb.push(" AND LOWER(county) = LOWER(").push_bind(county.to_string()).push(")");
        }
        if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            qb.push(" AND name ILIKE ").push_bind(format!("%{q}%"));
        }
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM organizations WHERE TRUE");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {ORGANIZATION_COLUMNS} FROM organizations WHERE TRUE"));
    push_filters(&mut qb);
    qb.push(" ORDER BY name LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let organizations: Vec<Organization> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(organizations, page, total)))
}

/// Organization details with its member representatives.
pub async fn get_organization(
    State(pool): State<PgPool>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let organization = fetch_organization(&pool, id).await?;

    let visible = organization.status == VerificationStatus::Approved
        || viewer.as_ref().is_some_and(|v| v.can_manage(organization.owner_id));
    if !visible {
        return Err(AppError::NotFound("Organization not found".to_string()));
    }

    let sql = format!("{REPRESENTATIVE_SUMMARY_SELECT} WHERE r.organization_id = $1 ORDER BY u.last_name");
    let members = sqlx::query_as::<_, RepresentativeSummary>(&sql)
        .bind(id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(OrganizationDetail { organization, members }))
}

/// Partial update; owner or admin.
pub async fn update_organization(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateOrganizationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let org = fetch_organization(&pool, id).await?;
    ensure_manager(&user, &org)?;

    if payload.is_empty() {
        return Ok(Json(org));
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE organizations SET updated_at = NOW()");
    if let Some(name) = &payload.name {
        qb.push(", name = ").push_bind(name.trim());
    }
    if let Some(org_type) = payload.org_type {
        qb.push(", org_type = ").push_bind(org_type);
    }
    if let Some(description) = &payload.description {
        qb.push(", description = ").push_bind(description);
    }
    if let Some(contact_email) = &payload.contact_email {
        qb.push(", contact_email = ").push_bind(contact_email);
    }
    if let Some(contact_phone) = &payload.contact_phone {
        qb.push(", contact_phone = ").push_bind(contact_phone);
    }
    if let Some(website) = &payload.website {
        qb.push(", website = ").push_bind(website);
    }
    if let Some(county) = &payload.county {
        qb.push(", county = ").push_bind(county);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(format!(" RETURNING {ORGANIZATION_COLUMNS}"));

    let updated: Organization = qb.build_query_as().fetch_one(&pool).await?;
    Ok(Json(updated))
}

/// Replaces the organization logo (multipart field `file`).
pub async fn upload_logo(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let org = fetch_organization(&state.pool, id).await?;
    ensure_manager(&user, &org)?;

    let file = read_single(&mut multipart, "file", Accept::Images, state.config.max_upload_bytes).await?;
    let stored = store(state.storage.as_ref(), "logos", file).await?;

    sqlx::query("UPDATE organizations SET logo_url = $1, updated_at = NOW() WHERE id = $2")
        .bind(&stored.url)
        .bind(id)
        .execute(&state.pool)
        .await?;

    discard(state.storage.as_ref(), org.logo_url.as_deref()).await;

    Ok(Json(json!({ "logo_url": stored.url })))
}

/// Uploads registration documents and opens a verification request.
pub async fn submit_verification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let org = fetch_organization(&state.pool, id).await?;
    if org.owner_id != user.id {
        return Err(AppError::Forbidden("Only the organization owner can request verification".to_string()));
    }
    if org.status == VerificationStatus::Approved {
        return Err(AppError::Conflict("Organization is already verified".to_string()));
    }

    let documents = store_documents(&state, &mut multipart, "verification/organizations").await?;

    let mut tx = state.pool.begin().await?;
    let request = open_request(&mut tx, user.id, VerificationSubject::Organization, id, &documents).await?;
    sqlx::query("UPDATE organizations SET status = 'pending', updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(organization_id = id, request_id = request.id, "organization verification requested");
    Ok((StatusCode::CREATED, Json(request)))
}

/// Links a representative profile to the organization.
pub async fn add_member(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<impl IntoResponse, AppError> {
    let org = fetch_organization(&pool, id).await?;
    ensure_manager(&user, &org)?;

    let result = sqlx::query("UPDATE representatives SET organization_id = $1, updated_at = NOW() WHERE id = $2")
        .bind(id)
        .bind(payload.representative_id)
        .execute(&pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Representative not found".to_string()));
    }

    Ok(Json(json!({ "message": "Member added" })))
}

/// Unlinks a representative from the organization.
pub async fn remove_member(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path((id, representative_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let org = fetch_organization(&pool, id).await?;
    ensure_manager(&user, &org)?;

    let result = sqlx::query(
        "UPDATE representatives SET organization_id = NULL, updated_at = NOW() WHERE id = $1 AND organization_id = $2",
    )
    .bind(representative_id)
    .bind(id)
    .execute(&pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Representative is not a member of this organization".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
