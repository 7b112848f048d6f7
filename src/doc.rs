//! OpenAPI document served at `/api-docs/openapi.json` and rendered by
//! Swagger UI at `/swagger-ui`.
//!
//! Only the endpoints most clients integrate against first are annotated:
//! registration and login, the forum and direct messaging.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::{
    handlers::{auth, forum, messages},
    models::{
        message::{ConversationSummary, Message, MessageStatus, SendMessageRequest},
        post::{CreatePostRequest, Post, PostCategory, VoteDirection, VoteRequest, VoteSummary},
        user::{LoginRequest, LoginResponse, PublicProfile, RegisterRequest, Role, User},
    },
};

/// Registers the bearer token and the session cookie as security schemes.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi
            .components
            .get_or_insert_with(utoipa::openapi::Components::default);

        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
        components.add_security_scheme(
            "cookie",
            SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::with_description(
                "token",
                "HttpOnly cookie set by POST /api/auth/login.",
            ))),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    modifiers(&SecurityAddon),
    info(
        title = "Civic engagement platform API",
        description = "Citizens, representatives and organizations: forum, messaging, verification and more."
    ),
    paths(
        auth::register,
        auth::login,
        forum::create_post,
        forum::list_posts,
        forum::vote_post,
        messages::send_message,
        messages::list_conversations,
    ),
    components(schemas(
        User,
        Role,
        PublicProfile,
        RegisterRequest,
        LoginRequest,
        LoginResponse,
        Post,
        PostCategory,
        CreatePostRequest,
        VoteDirection,
        VoteRequest,
        VoteSummary,
        Message,
        MessageStatus,
        SendMessageRequest,
        ConversationSummary,
    )),
    tags(
        (name = "auth", description = "Registration and sessions"),
        (name = "forum", description = "Posts, votes and comments"),
        (name = "messages", description = "Direct messages")
    )
)]
pub struct ApiDoc;
