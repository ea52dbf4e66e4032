// src/main.rs

use std::{net::SocketAddr, sync::Arc, time::Duration};

use dotenvy::dotenv;
use lms_backend::{
    config::Config,
    routes,
    services::{certificate::FileCertificateRenderer, dispatch},
    state::AppState,
    utils::hash::hash_password,
};
use sqlx::{PgPool, postgres::PgPoolOptions};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

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

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    if let Err(e) = seed_admin_user(&pool, &config).await {
        tracing::error!("Failed to seed admin user: {:?}", e);
    }

    if let Err(e) = tokio::fs::create_dir_all(&config.media_root).await {
        tracing::warn!("Could not create media root {}: {:?}", config.media_root, e);
    }

    let state = AppState {
        pool: pool.clone(),
        dispatcher: dispatch::from_config(&config),
        certificates: Arc::new(FileCertificateRenderer::new(&config.media_root)),
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .unwrap_or_else(|e| panic!("Invalid BIND_ADDR {}: {}", config.bind_addr, e));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");

    // ConnectInfo feeds the login IP when no proxy header is present
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .expect("Server error");
}

/// Creates the configured admin (active, with a profile) if it does not exist yet.
async fn seed_admin_user(pool: &PgPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let (Some(username), Some(password)) = (&config.admin_username, &config.admin_password) else {
        return Ok(());
    };

    let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if exists.is_some() {
        return Ok(());
    }

    tracing::info!("Seeding admin user: {}", username);
    let hashed_password = hash_password(password)?;
    let email = config
        .admin_email
        .clone()
        .unwrap_or_else(|| format!("{}@localhost", username));

    let mut tx = pool.begin().await?;
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (username, email, password, role, is_active)
        VALUES ($1, $2, $3, 'admin', TRUE)
        RETURNING id
        "#,
    )
    .bind(username)
    .bind(&email)
    .bind(&hashed_password)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO profiles (user_id, role, name) VALUES ($1, 'admin', $2)")
        .bind(id)
        .bind(username)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!("Admin user created successfully.");
    Ok(())
}
