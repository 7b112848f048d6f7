use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        local_service::{
            CreateLocalServiceRequest, LOCAL_SERVICE_COLUMNS, LocalService, LocalServiceListParams,
            UpdateLocalServiceRequest,
        },
        pagination::{Page, PageParams},
    },
    utils::{html::plain_text, jwt::AuthUser},
};

async fn fetch_service(pool: &PgPool, id: i64) -> Result<LocalService, AppError> {
    let sql = format!("SELECT {LOCAL_SERVICE_COLUMNS} FROM local_services WHERE id = $1");
    sqlx::query_as::<_, LocalService>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Service not found".to_string()))
}

async fn owns_organization(pool: &PgPool, user_id: i64, organization_id: i64) -> Result<bool, AppError> {
    let owner: Option<i64> = sqlx::query_scalar("SELECT owner_id FROM organizations WHERE id = $1")
        .bind(organization_id)
        .fetch_optional(pool)
        .await?;
    Ok(owner == Some(user_id))
}

/// Admins, the listing's creator, or the owner of its organization.
async fn ensure_service_manager(pool: &PgPool, user: &AuthUser, service: &LocalService) -> Result<(), AppError> {
    if user.can_manage(service.created_by) {
        return Ok(());
    }
    if let Some(organization_id) = service.organization_id {
        if owns_organization(pool, user.id, organization_id).await? {
            return Ok(());
        }
    }
    Err(AppError::Forbidden("You cannot manage this service".to_string()))
}

pub async fn list_services(
    State(pool): State<PgPool>,
    Query(params): Query<LocalServiceListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE TRUE");
        for (column, value) in [("category", &params.category), ("county", &params.county)] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                qb.push(format!(" AND LOWER({column}) = LOWER("))
                    .push_bind(value.to_string())
                    .push(")");
            }
        }
        if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{q}%");
            qb.push(" AND (name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM local_services");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {LOCAL_SERVICE_COLUMNS} FROM local_services"));
    push_filters(&mut qb);
    qb.push(" ORDER BY name, id LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let services: Vec<LocalService> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(services, page, total)))
}

pub async fn get_service(State(pool): State<PgPool>, Path(id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(fetch_service(&pool, id).await?))
}

/// Organization owners list services under their organization; admins may
/// add standalone entries.
pub async fn create_service(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreateLocalServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let allowed = match payload.organization_id {
        Some(organization_id) => user.is_admin() || owns_organization(&pool, user.id, organization_id).await?,
        None => user.is_admin(),
    };
    if !allowed {
        return Err(AppError::Forbidden(
            "Only organization owners can list services".to_string(),
        ));
    }

    let sql = format!(
        "INSERT INTO local_services \
             (organization_id, created_by, name, category, description, county, address, contact, website) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {LOCAL_SERVICE_COLUMNS}"
    );
    let service = sqlx::query_as::<_, LocalService>(&sql)
        .bind(payload.organization_id)
        .bind(user.id)
        .bind(plain_text(&payload.name))
        .bind(payload.category.trim().to_lowercase())
        .bind(payload.description.as_deref().map(plain_text))
        .bind(&payload.county)
        .bind(&payload.address)
        .bind(&payload.contact)
        .bind(&payload.website)
        .fetch_one(&pool)
        .await?;

    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn update_service(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLocalServiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let current = fetch_service(&pool, id).await?;
    ensure_service_manager(&pool, &user, &current).await?;

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE local_services SET id = id");
    if let Some(name) = &payload.name {
        qb.push(", name = ").push_bind(plain_text(name));
    }
    if let Some(category) = &payload.category {
        qb.push(", category = ").push_bind(category.trim().to_lowercase());
    }
    if let Some(description) = &payload.description {
        qb.push(", description = ").push_bind(plain_text(description));
    }
    if let Some(county) = &payload.county {
        qb.push(", county = ").push_bind(county);
    }
    if let Some(address) = &payload.address {
        qb.push(", address = ").push_bind(address);
    }
    if let Some(contact) = &payload.contact {
        qb.push(", contact = ").push_bind(contact);
    }
    if let Some(website) = &payload.website {
        qb.push(", website = ").push_bind(website);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.push(format!(" RETURNING {LOCAL_SERVICE_COLUMNS}"));

    let service: LocalService = qb.build_query_as().fetch_one(&pool).await?;
    Ok(Json(service))
}

pub async fn delete_service(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let current = fetch_service(&pool, id).await?;
    ensure_service_manager(&pool, &user, &current).await?;

    sqlx::query("DELETE FROM local_services WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
