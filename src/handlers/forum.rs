use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json as SqlJson};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        comment::{CommentResponse, CreateCommentRequest, thread_root},
        notification::{NewNotification, NotificationKind},
        pagination::{Page, PageParams},
        post::{
            CreatePostRequest, Post, PostListParams, UpdatePostRequest, VoteChange, VoteDirection, VoteRequest,
            VoteSummary, resolve_vote, select_posts,
        },
    },
    services::notifier,
    state::AppState,
    utils::{
        html::{clean_html, plain_text},
        jwt::{AuthUser, MaybeUser},
    },
};

const COMMENT_SELECT: &str = r#"
    SELECT
        c.id, c.post_id,
        CASE WHEN c.deleted_at IS NULL THEN c.author_id END AS author_id,
        CASE WHEN c.deleted_at IS NULL THEN u.first_name || ' ' || u.last_name END AS author_name,
        CASE WHEN c.deleted_at IS NULL THEN u.avatar_url END AS author_avatar,
        CASE WHEN c.deleted_at IS NULL THEN c.content ELSE '[deleted]' END AS content,
        c.deleted_at IS NOT NULL AS is_deleted,
        c.root_id, c.parent_id, c.created_at
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn sanitized_title(raw: &str) -> Result<String, AppError> {
    let title = plain_text(raw);
    if title.chars().count() < 3 {
        return Err(AppError::BadRequest("Title length must be between 3 and 200 chars".to_string()));
    }
    Ok(title)
}

fn sanitized_content(raw: &str) -> Result<String, AppError> {
    let content = clean_html(raw);
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("Content is empty after sanitizing".to_string()));
    }
    Ok(content)
}

async fn fetch_post(pool: &PgPool, id: i64, viewer: Option<i64>) -> Result<Post, AppError> {
    let mut qb = select_posts(viewer);
    qb.push(" WHERE p.deleted_at IS NULL AND p.id = ").push_bind(id);
    qb.build_query_as::<Post>()
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))
}

/// Create a new post.
/// Content is sanitized HTML; the title is plain text.
#[utoipa::path(
    post,
    path = "/api/forum/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not logged in")
    ),
    security(("bearer" = [])),
    tag = "forum"
)]
pub async fn create_post(
    State(pool): State<PgPool>,
    user: AuthUser,
    Json(payload): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Validate and sanitize payload
    payload.validate()?;
    let title = sanitized_title(&payload.title)?;
    let content = sanitized_content(&payload.content)?;
    let tags = normalize_tags(&payload.tags);

    // 2. Insert Post
    let post_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO posts (author_id, title, content, category, tags, county)
        VALUES ($1, $2, $3, COALESCE($4, 'general'::post_category), $5, $6)
        RETURNING id
        "#,
    )
    .bind(user.id)
    .bind(&title)
    .bind(&content)
    .bind(payload.category)
    .bind(SqlJson(&tags))
    .bind(&payload.county)
    .fetch_one(&pool)
    .await?;

    tracing::info!(post_id, author_id = user.id, "post created");

    let post = fetch_post(&pool, post_id, Some(user.id)).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// List posts. Soft-deleted posts are never returned.
/// Includes the caller's vote when a valid token is presented.
#[utoipa::path(
    get,
    path = "/api/forum/posts",
    params(
        ("category" = Option<String>, Query, description = "Filter by category"),
        ("county" = Option<String>, Query, description = "Filter by county"),
        ("q" = Option<String>, Query, description = "Search title and content"),
        ("sort" = Option<String>, Query, description = "new | top | discussed"),
        ("page" = Option<i64>, Query, description = "Page number, from 1"),
        ("limit" = Option<i64>, Query, description = "Page size, max 100")
    ),
    responses((status = 200, description = "A page of posts")),
    tag = "forum"
)]
pub async fn list_posts(
    State(pool): State<PgPool>,
    MaybeUser(viewer): MaybeUser,
    Query(params): Query<PostListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = PageParams::new(params.page, params.limit);

    let push_filters = |qb: &mut QueryBuilder<'_, Postgres>| {
        qb.push(" WHERE p.deleted_at IS NULL");
        if let Some(category) = params.category {
            qb.push(" AND p.category = ").push_bind(category);
        }
        if let Some(county) = params.county.as_deref().filter(|c| !c.trim().is_empty()) {
            qb.push(" AND LOWER(p.county) = LOWER(").push_bind(county.trim().to_string()).push(")");
        }
        if let Some(author_id) = params.author_id {
            qb.push(" AND p.author_id = ").push_bind(author_id);
        }
        if let Some(q) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{q}%");
            qb.push(" AND (p.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.content ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    };

    let mut count: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM posts p");
    push_filters(&mut count);
    let total: i64 = count.build_query_scalar().fetch_one(&pool).await?;

    let mut qb = select_posts(viewer.map(|v| v.id));
    push_filters(&mut qb);
    qb.push(" ORDER BY ")
        .push(params.sort.order_by())
        .push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());

    let posts: Vec<Post> = qb.build_query_as().fetch_all(&pool).await?;
    Ok(Json(Page::new(posts, page, total)))
}

/// Get a single post by ID.
pub async fn get_post(
    State(pool): State<PgPool>,
    MaybeUser(viewer): MaybeUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let post = fetch_post(&pool, id, viewer.map(|v| v.id)).await?;
    Ok(Json(post))
}

/// Edit a post. Author only.
pub async fn update_post(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let post = fetch_post(&pool, id, Some(user.id)).await?;
    if post.author_id != user.id {
        return Err(AppError::Forbidden("You can only edit your own posts".to_string()));
    }

    let mut qb: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE posts SET updated_at = NOW()");
    if let Some(title) = &payload.title {
        qb.push(", title = ").push_bind(sanitized_title(title)?);
    }
    if let Some(content) = &payload.content {
        qb.push(", content = ").push_bind(sanitized_content(content)?);
    }
    if let Some(category) = payload.category {
        qb.push(", category = ").push_bind(category);
    }
    if let Some(tags) = &payload.tags {
        qb.push(", tags = ").push_bind(SqlJson(normalize_tags(tags)));
    }
    if let Some(county) = &payload.county {
        qb.push(", county = ").push_bind(county);
    }
    qb.push(" WHERE id = ").push_bind(id);
    qb.build().execute(&pool).await?;

    Ok(Json(fetch_post(&pool, id, Some(user.id)).await?))
}

/// Delete a post (Soft Delete).
/// Requires: Login + (Author OR Admin).
pub async fn delete_post(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    // 1. Fetch Post to check ownership
    let author_id: i64 = sqlx::query_scalar("SELECT author_id FROM posts WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    // 2. Check Permission
    if !user.can_manage(author_id) {
        return Err(AppError::Forbidden("You are not authorized to delete this post".to_string()));
    }

    // 3. Soft Delete
    sqlx::query("UPDATE posts SET deleted_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    tracing::info!(post_id = id, deleted_by = user.id, "post deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Casts, removes or switches the caller's vote.
///
/// Voting the same direction twice removes the vote. The vote row and the
/// post counters change in one transaction with the post row locked.
#[utoipa::path(
    post,
    path = "/api/forum/posts/{id}/vote",
    params(("id" = i64, Path, description = "Post id")),
    request_body = VoteRequest,
    responses(
        (status = 200, description = "Vote applied", body = VoteSummary),
        (status = 404, description = "Post not found")
    ),
    security(("bearer" = [])),
    tag = "forum"
)]
pub async fn vote_post(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
    Json(payload): Json<VoteRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.pool.begin().await?;

    let (author_id, title): (i64, String) =
        sqlx::query_as("SELECT author_id, title FROM posts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let existing: Option<VoteDirection> =
        sqlx::query_scalar("SELECT direction FROM post_votes WHERE post_id = $1 AND user_id = $2")
            .bind(id)
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?;

    let change = resolve_vote(existing, payload.direction);
    match change {
        VoteChange::Cast(direction) => {
            sqlx::query("INSERT INTO post_votes (post_id, user_id, direction) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(user.id)
                .bind(direction)
                .execute(&mut *tx)
                .await?;
        }
        VoteChange::Removed(_) => {
            sqlx::query("DELETE FROM post_votes WHERE post_id = $1 AND user_id = $2")
                .bind(id)
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
        }
        VoteChange::Switched { to, .. } => {
            sqlx::query("UPDATE post_votes SET direction = $1, created_at = NOW() WHERE post_id = $2 AND user_id = $3")
                .bind(to)
                .bind(id)
                .bind(user.id)
                .execute(&mut *tx)
                .await?;
        }
    }

    let (up_delta, down_delta) = change.deltas();
    let (upvotes, downvotes): (i32, i32) = sqlx::query_as(
        "UPDATE posts SET upvotes = GREATEST(upvotes + $1, 0), downvotes = GREATEST(downvotes + $2, 0) \
         WHERE id = $3 RETURNING upvotes, downvotes",
    )
    .bind(up_delta)
    .bind(down_delta)
    .bind(id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let user_vote = change.resulting_vote();
    if user_vote == Some(VoteDirection::Up) && existing != Some(VoteDirection::Up) && author_id != user.id {
        notifier::notify(
            &state.pool,
            &state.hub,
            author_id,
            NewNotification::new(NotificationKind::Vote, "New upvote", format!("Your post \"{title}\" was upvoted"))
                .link(format!("/forum/posts/{id}"))
                .data(json!({ "post_id": id, "voter_id": user.id })),
        )
        .await;
    }

    Ok(Json(VoteSummary {
        post_id: id,
        upvotes,
        downvotes,
        score: upvotes - downvotes,
        user_vote,
    }))
}

/// Comments of a post in thread order: each root followed by its replies.
/// A deleted comment stays as an anonymous placeholder while any comment
/// below it, at any depth, is still live.
pub async fn list_comments(State(pool): State<PgPool>, Path(post_id): Path<i64>) -> Result<impl IntoResponse, AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM posts WHERE id = $1 AND deleted_at IS NULL)")
        .bind(post_id)
        .fetch_one(&pool)
        .await?;
    if !exists {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let sql = format!(
        "WITH RECURSIVE kept AS ( \
             SELECT id, parent_id FROM comments WHERE post_id = $1 AND deleted_at IS NULL \
             UNION \
             SELECT p.id, p.parent_id FROM comments p JOIN kept k ON p.id = k.parent_id \
         ) \
         {COMMENT_SELECT} \
         WHERE c.id IN (SELECT id FROM kept) \
         ORDER BY COALESCE(c.root_id, c.id), c.root_id IS NOT NULL, c.created_at, c.id"
    );
    let comments = sqlx::query_as::<_, CommentResponse>(&sql)
        .bind(post_id)
        .fetch_all(&pool)
        .await?;

    Ok(Json(comments))
}

#[derive(sqlx::FromRow)]
struct ParentComment {
    post_id: i64,
    author_id: i64,
    root_id: Option<i64>,
    deleted: bool,
}

/// Adds a comment or a reply. Notifies the post author and, for replies,
/// the parent comment's author.
pub async fn create_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(post_id): Path<i64>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let content = plain_text(&payload.content);
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".to_string()));
    }

    let mut tx = state.pool.begin().await?;

    let (post_author, title): (i64, String) =
        sqlx::query_as("SELECT author_id, title FROM posts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let (parent_author, root_id) = match payload.parent_id {
        Some(parent_id) => {
            let parent = sqlx::query_as::<_, ParentComment>(
                "SELECT post_id, author_id, root_id, deleted_at IS NOT NULL AS deleted FROM comments WHERE id = $1",
            )
            .bind(parent_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

            if parent.post_id != post_id {
                return Err(AppError::BadRequest("Parent comment belongs to another post".to_string()));
            }
            if parent.deleted {
                return Err(AppError::BadRequest("Cannot reply to a deleted comment".to_string()));
            }
            (Some(parent.author_id), Some(thread_root(parent_id, parent.root_id)))
        }
        None => (None, None),
    };

    let comment_id: i64 = sqlx::query_scalar(
        "INSERT INTO comments (post_id, author_id, parent_id, root_id, content) \
         VALUES ($1, $2, $3, $4, $5) RETURNING id",
    )
    .bind(post_id)
    .bind(user.id)
    .bind(payload.parent_id)
    .bind(root_id)
    .bind(&content)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE posts SET comments_count = comments_count + 1 WHERE id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let sql = format!("{COMMENT_SELECT} WHERE c.id = $1");
    let comment = sqlx::query_as::<_, CommentResponse>(&sql)
        .bind(comment_id)
        .fetch_one(&state.pool)
        .await?;

    let link = format!("/forum/posts/{post_id}");
    let data = json!({ "post_id": post_id, "comment_id": comment_id });

    if post_author != user.id {
        notifier::notify(
            &state.pool,
            &state.hub,
            post_author,
            NewNotification::new(NotificationKind::Comment, "New comment", format!("New comment on \"{title}\""))
                .link(link.clone())
                .data(data.clone()),
        )
        .await;
    }
    if let Some(parent_author) = parent_author.filter(|a| *a != user.id && *a != post_author) {
        notifier::notify(
            &state.pool,
            &state.hub,
            parent_author,
            NewNotification::new(NotificationKind::Reply, "New reply", "Someone replied to your comment")
                .link(link)
                .data(data),
        )
        .await;
    }

    Ok((StatusCode::CREATED, Json(comment)))
}

/// Soft-deletes a comment. Author or admin.
pub async fn delete_comment(
    State(pool): State<PgPool>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    let (post_id, author_id): (i64, i64) =
        sqlx::query_as("SELECT post_id, author_id FROM comments WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if !user.can_manage(author_id) {
        return Err(AppError::Forbidden("You are not authorized to delete this comment".to_string()));
    }

    sqlx::query("UPDATE comments SET deleted_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE posts SET comments_count = GREATEST(comments_count - 1, 0) WHERE id = $1")
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(comment_id = id, deleted_by = user.id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}
