// src/main.rs

use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use civic_backend::config::Config;
use civic_backend::create_router;
use civic_backend::error::AppError;
use civic_backend::models::user::normalize_email;
use civic_backend::state::AppState;
use civic_backend::utils::hash::hash_password;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DB_CONNECT_RETRIES: u32 = 5;

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration from environment (.env included)
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    let Some(pool) = connect_with_retry(&config.database_url).await else {
        return ExitCode::FAILURE;
    };
    tracing::info!("Database connected");

    tracing::info!("Running migrations...");
    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!("Failed to run database migrations: {e}");
        return ExitCode::FAILURE;
    }
    tracing::info!("Migrations applied successfully");

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {e}");
    }

    let bind_addr = config.bind_addr;
    let state = match AppState::new(pool, config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("Failed to initialize services: {e}");
            return ExitCode::FAILURE;
        }
    };

    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {bind_addr}: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("Listening on {bind_addr}");

    // Peer addresses feed the rate limiter.
    if let Err(e) = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await {
        tracing::error!("Server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn connect_with_retry(database_url: &str) -> Option<PgPool> {
    let mut retry_count = 0;
    loop {
        match PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(database_url)
            .await
        {
            Ok(pool) => return Some(pool),
            Err(e) => {
                retry_count += 1;
                if retry_count > DB_CONNECT_RETRIES {
                    tracing::error!("Failed to connect to database after {DB_CONNECT_RETRIES} retries: {e}");
                    return None;
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {retry_count})");
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
}

/// Creates the bootstrap admin from `ADMIN_EMAIL` / `ADMIN_PASSWORD` when no
/// account with that email exists yet.
async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), AppError> {
    let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
        return Ok(());
    };
    let email = normalize_email(email);

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    if exists {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {email}");
    let hashed_password = hash_password(password)?;
    sqlx::query(
        "INSERT INTO users (first_name, last_name, email, password, role, is_verified) \
         VALUES ('Platform', 'Admin', $1, $2, 'admin', TRUE)",
    )
    .bind(&email)
    .bind(&hashed_password)
    .execute(pool)
    .await?;
    tracing::info!("Admin user created successfully");
    Ok(())
}
