// src/routes.rs

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::{Config, StorageBackend},
    doc::ApiDoc,
    error,
    handlers::{
        admin, auth, citizen, communications, forum, local_services, locations, messages, notifications,
        organizations, phone, projects, representatives, stats, surveys, uploads, users, verification, ws,
    },
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, optional_auth_middleware},
};

/// Origins allowed when `CORS_ORIGINS` is empty: the usual dev servers.
const DEV_ORIGINS: [&str; 2] = ["http://localhost:5173", "http://localhost:3000"];

fn cors_layer(config: &Config) -> CorsLayer {
    let configured: Vec<&str> = config.cors_origins.iter().map(String::as_str).collect();
    let origins: Vec<HeaderValue> = if configured.is_empty() { DEV_ORIGINS.to_vec() } else { configured }
        .into_iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Routes under a post, mounted at both `/api/forum/posts` and `/api/posts`.
fn post_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(forum::list_posts).post(forum::create_post))
        .route(
            "/{id}",
            get(forum::get_post).put(forum::update_post).delete(forum::delete_post),
        )
        .route("/{id}/vote", post(forum::vote_post))
        .route("/{id}/comments", get(forum::list_comments).post(forum::create_comment))
}

/// Assembles the main application router.
///
/// Groups that mix public and protected endpoints run the optional auth
/// middleware; protected handlers then require an [`AuthUser`] extractor,
/// which answers 401 when no valid token was presented.
///
/// [`AuthUser`]: crate::utils::jwt::AuthUser
pub fn create_router(state: AppState) -> Router {
    let optional_auth = || middleware::from_fn_with_state(state.clone(), optional_auth_middleware);
    let require_auth = || middleware::from_fn_with_state(state.clone(), auth_middleware);

    let mut auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/logout-all", post(auth::logout_all))
        .route("/me", get(auth::me))
        .route("/password", put(auth::change_password))
        .route_layer(optional_auth());

    if state.config.rate_limit_enabled {
        match GovernorConfigBuilder::default().per_second(2).burst_size(10).finish() {
            Some(governor_conf) => {
                auth_routes = auth_routes.layer(GovernorLayer::new(Arc::new(governor_conf)));
            }
            None => tracing::warn!("invalid rate limit configuration, auth routes are not rate limited"),
        }
    }

    let user_routes = Router::new()
        .route("/search", get(users::search))
        .route("/me", put(users::update_me).delete(users::deactivate_me))
        .route("/me/avatar", post(users::upload_avatar))
        .route("/{id}", get(users::get_profile))
        .route_layer(optional_auth());

    let organization_routes = Router::new()
        .route(
            "/",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/{id}",
            get(organizations::get_organization).put(organizations::update_organization),
        )
        .route("/{id}/logo", post(organizations::upload_logo))
        .route("/{id}/verification", post(organizations::submit_verification))
        .route("/{id}/members", post(organizations::add_member))
        .route("/{id}/members/{rep_id}", delete(organizations::remove_member))
        .route_layer(optional_auth());

    let representative_routes = Router::new()
        .route(
            "/",
            get(representatives::list_representatives).post(representatives::create_representative),
        )
        .route("/me", put(representatives::update_my_profile))
        .route("/me/documents", post(representatives::upload_documents))
        .route("/{id}", get(representatives::get_representative))
        .route_layer(optional_auth());

    let forum_routes = Router::new()
        .nest("/posts", post_routes())
        .route("/comments/{id}", delete(forum::delete_comment))
        .route_layer(optional_auth());

    let message_routes = Router::new()
        .route("/", post(messages::send_message))
        .route("/conversations", get(messages::list_conversations))
        .route("/conversations/{user_id}", get(messages::get_conversation))
        .route("/unread-count", get(messages::unread_count))
        .route("/{id}", delete(messages::delete_message))
        .route("/{id}/read", put(messages::mark_read))
        .route("/{id}/delivered", put(messages::mark_delivered))
        .route_layer(require_auth());

    let notification_routes = Router::new()
        .route("/", get(notifications::list_notifications))
        .route("/unread-count", get(notifications::unread_count))
        .route("/read-all", put(notifications::mark_all_read))
        .route("/{id}", delete(notifications::delete_notification))
        .route("/{id}/read", put(notifications::mark_read))
        .route_layer(require_auth());

    let communication_routes = Router::new()
        .route(
            "/",
            get(communications::list_for_me).post(communications::create_communication),
        )
        .route("/sent", get(communications::list_sent))
        .route_layer(require_auth());

    let citizen_routes = Router::new()
        .route("/dashboard", get(citizen::dashboard))
        .route("/representatives", get(citizen::my_representatives))
        .route(
            "/interactions",
            get(citizen::list_interactions).post(citizen::create_interaction),
        )
        .route("/interactions/{id}/respond", post(citizen::respond_interaction))
        .route("/interactions/{id}/close", post(citizen::close_interaction))
        .route_layer(require_auth());

    let survey_routes = Router::new()
        .route("/", get(surveys::list_open_surveys).post(surveys::create_survey))
        .route("/{id}", get(surveys::get_survey))
        .route("/{id}/responses", post(surveys::submit_response))
        .route("/{id}/results", get(surveys::survey_results))
        .route("/{id}/close", post(surveys::close_survey))
        .route_layer(optional_auth());

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route("/{id}", get(projects::get_project).put(projects::update_project))
        .route("/{id}/metrics", get(projects::list_metrics).post(projects::add_metric))
        .route_layer(optional_auth());

    let service_routes = Router::new()
        .route(
            "/",
            get(local_services::list_services).post(local_services::create_service),
        )
        .route(
            "/{id}",
            get(local_services::get_service)
                .put(local_services::update_service)
                .delete(local_services::delete_service),
        )
        .route_layer(optional_auth());

    let location_routes = Router::new()
        .route("/counties", get(locations::counties))
        .route("/counties/{county}/constituencies", get(locations::constituencies))
        .route("/constituencies/{constituency}/wards", get(locations::wards));

    let phone_routes = Router::new()
        .route("/send", post(phone::send_code))
        .route("/verify", post(phone::verify_code))
        .route_layer(require_auth());

    let upload_routes = Router::new()
        .route("/", post(uploads::upload_file))
        .route_layer(require_auth());

    // Auth first, then the admin check.
    let admin_routes = Router::new()
        .route("/verifications", get(verification::list_verifications))
        .route("/verifications/{id}", get(verification::get_verification))
        .route("/verifications/{id}/approve", post(verification::approve_verification))
        .route("/verifications/{id}/reject", post(verification::reject_verification))
        .route("/users", get(admin::list_users))
        .route("/users/{id}", put(admin::update_user).delete(admin::delete_user))
        .route("/locations", post(admin::create_location))
        .route_layer(middleware::from_fn(admin_middleware))
        .route_layer(require_auth());

    let stats_routes = Router::new().route("/", get(stats::platform_stats)).merge(
        Router::new()
            .route("/admin", get(stats::admin_stats))
            .route_layer(middleware::from_fn(admin_middleware))
            .route_layer(require_auth()),
    );

    let mut app = Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/organizations", organization_routes)
        .nest("/api/representatives", representative_routes)
        .nest("/api/forum", forum_routes)
        .nest("/api/posts", post_routes().route_layer(optional_auth()))
        .nest("/api/messages", message_routes)
        .nest("/api/notifications", notification_routes)
        .nest("/api/communications", communication_routes)
        .nest("/api/citizen", citizen_routes)
        .nest("/api/surveys", survey_routes)
        .nest("/api/projects", project_routes)
        .nest("/api/services", service_routes)
        .nest("/api/locations", location_routes)
        .nest("/api/phone-verification", phone_routes)
        .nest("/api/uploads", upload_routes)
        .nest("/api/admin", admin_routes)
        .nest("/api/stats", stats_routes)
        .route("/ws", get(ws::ws_upgrade))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    if state.config.storage == StorageBackend::Local {
        app = app.nest_service("/uploads", ServeDir::new(&state.config.upload_dir));
    }

    let body_limit = state.config.max_upload_bytes.saturating_add(64 * 1024);

    app.fallback(error::not_found)
        // Global middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config))
        .with_state(state)
}
