use anyhow::{Context, Result};
use axum::http::{Method, header};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ngo_admin_api::api::{self, AppState};
use ngo_admin_api::config::Config;
use ngo_admin_api::context::AppContext;
use ngo_admin_api::db::{MemoryStore, PgStore, Store};
use ngo_admin_api::storage::{LocalStorage, ObjectStorage, SupabaseStorage};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("invalid configuration")?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "ngo_admin_api=info,tower_http=info".into()),
    );
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Database connection
    let store: Arc<dyn Store> = match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .min_connections(1)
                .acquire_timeout(std::time::Duration::from_secs(10))
                .idle_timeout(std::time::Duration::from_secs(300))
                .connect(database_url)
                .await
                .context("failed to connect to PostgreSQL")?;

            tracing::info!("Connected to PostgreSQL");

            // Run migrations
            sqlx::migrate!("./migrations").run(&pool).await?;

            tracing::info!("Database migrations completed");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on exit)");
            Arc::new(MemoryStore::new())
        }
    };

    // Picture storage
    let mut upload_dir = None;
    let storage: Arc<dyn ObjectStorage> = match config.supabase() {
        Some(supabase) => {
            tracing::info!(
                "Pictures go to Supabase bucket '{}' at {}",
                config.storage_bucket,
                supabase.url
            );
            Arc::new(SupabaseStorage::new(
                &supabase.url,
                &supabase.service_role_key,
                &config.storage_bucket,
            )?)
        }
        None => {
            tokio::fs::create_dir_all(&config.upload_dir)
                .await
                .with_context(|| format!("cannot create upload dir {}", config.upload_dir))?;
            tracing::warn!(
                "Supabase not configured, storing pictures in {}",
                config.upload_dir
            );
            upload_dir = Some(config.upload_dir.clone());
            Arc::new(LocalStorage::new(
                &config.upload_dir,
                config.public_base_url.clone(),
            ))
        }
    };

    if config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN not set, admin routes are unauthenticated");
    }

    let ctx = AppContext::new(store, storage);
    let state = AppState::new(ctx.clone(), config.admin_token.as_deref());

    // Configure CORS - allow the dashboard frontend origins
    let origins: Vec<header::HeaderValue> = config
        .frontend_origins()
        .iter()
        .filter_map(|origin| origin.parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
        // Cache preflight requests for 1 hour
        .max_age(std::time::Duration::from_secs(3600));

    tracing::info!("CORS configured for origins: {}", config.frontend_url);

    // Build router
    let mut app = api::router(state);
    if let Some(dir) = upload_dir {
        app = app.nest_service("/uploads", ServeDir::new(dir));
    }
    let app = app
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    ctx.shutdown().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
