use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod auth;
mod cleanup;
mod config;
mod error;
mod handlers;
mod media;
mod models;
mod pipeline;
mod repo;
mod staging;
mod storage;
mod system_info;
mod upload;

#[cfg(test)]
mod test_support;

use config::Config;
use handlers::{
    create_video_handler, get_video_handler, upload_thumbnail_handler, upload_video_handler,
};
use media::Ffmpeg;
use models::AppState;
use repo::InMemoryVideoRepository;
use storage::S3Storage;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/videos", post(create_video_handler))
        .route("/api/videos/:video_id", get(get_video_handler))
        .route("/api/thumbnail_upload/:video_id", post(upload_thumbnail_handler))
        .route("/api/video_upload/:video_id", post(upload_video_handler))
        .nest_service("/assets", ServeDir::new(&state.config.assets_root))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("video_ingest_backend=debug,tower_http=debug")),
        )
        .init();

    let config = Config::load()?;

    // Ensure directories exist
    tokio::fs::create_dir_all(&config.assets_root).await?;
    tokio::fs::create_dir_all(&config.staging_dir).await?;

    system_info::print_startup_info(&config);

    let storage = S3Storage::new(&config.storage)?;

    let app_state = Arc::new(AppState {
        videos: Arc::new(InMemoryVideoRepository::new()),
        storage: Arc::new(storage),
        media: Arc::new(Ffmpeg::new(&config.ffmpeg)),
        config: config.clone(),
    });

    cleanup::start_cleanup_task(Arc::new(config.clone()));

    let app = router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("✅ Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
