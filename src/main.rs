//! Wellness Commerce - Self-hosted Store and Clinic Booking Service

use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Json;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use wellness_commerce::config::Config;
use wellness_commerce::notify::Notifier;
use wellness_commerce::routes;
use wellness_commerce::state::AppState;
use wellness_commerce::uploads;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    uploads::ensure_dirs(&config.upload_dir).await?;
    let notifier = Notifier::connect(&config).await;

    let state = AppState { db, config: Arc::new(config.clone()), notifier };
    let app = routes::api_router()
        .route(
            "/health",
            get(|| async { Json(serde_json::json!({"status": "healthy", "service": "wellness-commerce"})) }),
        )
        .nest_service("/uploads", ServeDir::new(&config.upload_dir))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .with_state(state);

    tracing::info!("🚀 Wellness Commerce listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
