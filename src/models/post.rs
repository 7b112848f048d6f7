use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Postgres, QueryBuilder, types::Json};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "post_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostCategory {
    General,
    Infrastructure,
    Health,
    Education,
    Security,
    Environment,
    Governance,
    Economy,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "vote_direction", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

/// Represents the 'posts' table joined with the author's name.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar: Option<String>,
    pub title: String,
    pub content: String,
    pub category: PostCategory,
    #[schema(value_type = Vec<String>)]
    pub tags: Json<Vec<String>>,
    pub county: Option<String>,
    pub upvotes: i32,
    pub downvotes: i32,
    pub comments_count: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,

    /// UI helper: the caller's vote, populated only for authenticated reads.
    #[sqlx(default)]
    pub user_vote: Option<VoteDirection>,
}

const POST_PROJECTION: &str = r#"
    SELECT
        p.id, p.author_id,
        (u.first_name || ' ' || u.last_name) AS author_name,
        u.avatar_url AS author_avatar,
        p.title, p.content, p.category, p.tags, p.county,
        p.upvotes, p.downvotes, p.comments_count,
        p.created_at, p.updated_at,
"#;

/// Starts a post query: projection, the viewer's own vote (NULL for
/// anonymous viewers) and the author join. Callers append the WHERE clause.
pub fn select_posts<'a>(viewer: Option<i64>) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(POST_PROJECTION);
    qb.push("(SELECT v.direction FROM post_votes v WHERE v.post_id = p.id AND v.user_id = ")
        .push_bind(viewer)
        .push(") AS user_vote FROM posts p JOIN users u ON u.id = p.author_id");
    qb
}

fn validate_tags(tags: &[String]) -> Result<(), validator::ValidationError> {
    if tags.len() > 10 {
        return Err(validator::ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 30) {
        return Err(validator::ValidationError::new("invalid_tag"));
    }
    Ok(())
}

/// DTO for creating a new post.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePostRequest {
    #[validate(length(
        min = 3,
        max = 200,
        message = "Title length must be between 3 and 200 chars"
    ))]
    pub title: String,

    #[validate(length(
        min = 1,
        max = 20000,
        message = "Content length must be between 1 and 20000 chars"
    ))]
    pub content: String,

    pub category: Option<PostCategory>,

    #[validate(custom(function = validate_tags))]
    #[serde(default)]
    pub tags: Vec<String>,

    #[validate(length(max = 100))]
    pub county: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 3, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 20000))]
    pub content: Option<String>,
    pub category: Option<PostCategory>,
    #[validate(custom(function = validate_tags))]
    pub tags: Option<Vec<String>>,
    #[validate(length(max = 100))]
    pub county: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    #[default]
    New,
    Top,
    Discussed,
}

impl PostSort {
    pub fn order_by(&self) -> &'static str {
        match self {
            PostSort::New => "p.created_at DESC",
            PostSort::Top => "(p.upvotes - p.downvotes) DESC, p.created_at DESC",
            PostSort::Discussed => "p.comments_count DESC, p.created_at DESC",
        }
    }
}

/// Query parameters for listing posts.
#[derive(Debug, Deserialize)]
pub struct PostListParams {
    pub category: Option<PostCategory>,
    pub county: Option<String>,
    pub author_id: Option<i64>,
    /// Search keyword for title/content match.
    pub q: Option<String>,
    #[serde(default)]
    pub sort: PostSort,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VoteRequest {
    pub direction: VoteDirection,
}

/// What a vote request does to the stored vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteChange {
    Cast(VoteDirection),
    Removed(VoteDirection),
    Switched { from: VoteDirection, to: VoteDirection },
}

impl VoteChange {
    /// Counter deltas as `(upvotes, downvotes)`.
    pub fn deltas(&self) -> (i32, i32) {
        fn unit(direction: VoteDirection, sign: i32) -> (i32, i32) {
            match direction {
                VoteDirection::Up => (sign, 0),
                VoteDirection::Down => (0, sign),
            }
        }
        match *self {
            VoteChange::Cast(d) => unit(d, 1),
            VoteChange::Removed(d) => unit(d, -1),
            VoteChange::Switched { from, to } => {
                let (a, b) = unit(from, -1);
                let (c, d) = unit(to, 1);
                (a + c, b + d)
            }
        }
    }

    /// The caller's vote after the change.
    pub fn resulting_vote(&self) -> Option<VoteDirection> {
        match *self {
            VoteChange::Cast(d) => Some(d),
            VoteChange::Removed(_) => None,
            VoteChange::Switched { to, .. } => Some(to),
        }
    }
}

/// Voting rules: no vote casts, the same direction again removes the vote,
/// the opposite direction switches it.
pub fn resolve_vote(existing: Option<VoteDirection>, requested: VoteDirection) -> VoteChange {
    match existing {
        None => VoteChange::Cast(requested),
        Some(current) if current == requested => VoteChange::Removed(current),
        Some(current) => VoteChange::Switched {
            from: current,
            to: requested,
        },
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VoteSummary {
    pub post_id: i64,
    pub upvotes: i32,
    pub downvotes: i32,
    pub score: i32,
    pub user_vote: Option<VoteDirection>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use VoteDirection::{Down, Up};

    #[rstest]
    #[case(None, Up, VoteChange::Cast(Up), (1, 0), Some(Up))]
    #[case(None, Down, VoteChange::Cast(Down), (0, 1), Some(Down))]
    #[case(Some(Up), Up, VoteChange::Removed(Up), (-1, 0), None)]
    #[case(Some(Down), Down, VoteChange::Removed(Down), (0, -1), None)]
    #[case(Some(Up), Down, VoteChange::Switched { from: Up, to: Down }, (-1, 1), Some(Down))]
    #[case(Some(Down), Up, VoteChange::Switched { from: Down, to: Up }, (1, -1), Some(Up))]
    fn vote_resolution(
        #[case] existing: Option<VoteDirection>,
        #[case] requested: VoteDirection,
        #[case] expected: VoteChange,
        #[case] deltas: (i32, i32),
        #[case] after: Option<VoteDirection>,
    ) {
        let change = resolve_vote(existing, requested);
        assert_eq!(change, expected);
        assert_eq!(change.deltas(), deltas);
        assert_eq!(change.resulting_vote(), after);
    }

    #[test]
    fn voting_twice_in_the_same_direction_cancels_out() {
        let first = resolve_vote(None, Up);
        let second = resolve_vote(first.resulting_vote(), Up);
        let (up1, down1) = first.deltas();
        let (up2, down2) = second.deltas();
        assert_eq!((up1 + up2, down1 + down2), (0, 0));
        assert_eq!(second.resulting_vote(), None);
    }

    #[test]
    fn tag_validation_limits_count_and_length() {
        let req = CreatePostRequest {
            title: "Broken streetlights on Moi Avenue".to_string(),
            content: "Three weeks and counting.".to_string(),
            category: Some(PostCategory::Infrastructure),
            tags: (0..11).map(|i| format!("tag{i}")).collect(),
            county: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn sort_defaults_to_newest() {
        let params: PostListParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.sort, PostSort::New);
        assert_eq!(PostSort::Top.order_by(), "(p.upvotes - p.downvotes) DESC, p.created_at DESC");
    }
}
