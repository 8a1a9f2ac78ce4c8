use axum::{
    body::Body,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    response::Json,
};
use std::{sync::Arc, time::Instant};
use tracing::info;
use uuid::Uuid;

use crate::{
    auth::authenticate,
    error::{AppError, DependencyContext},
    models::{AppState, CreateVideoRequest, Video, VideoResponse},
    pipeline::ingest_video,
    repo::owned_video,
    staging::StagingFile,
    storage::signed_video,
    upload::{is_video_type, receive_media, thumbnail_extension},
};

fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::ClientInput("Invalid ID".to_string()))
}

/// Create a draft video record owned by the caller
pub async fn create_video_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateVideoRequest>,
) -> Result<(StatusCode, Json<VideoResponse>), AppError> {
    let user_id = authenticate(&headers, &state.config.auth)?;

    if request.title.trim().is_empty() {
        return Err(AppError::ClientInput("Title is required".to_string()));
    }

    let video = state
        .videos
        .create_video(Video::new(user_id, request.title, request.description))
        .await?;

    info!("[POST /api/videos] created {} for {}", video.id, user_id);

    Ok((StatusCode::CREATED, Json(VideoResponse::new(video, None))))
}

/// Read a video record back with a signed retrieval URL
pub async fn get_video_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<VideoResponse>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(&headers, &state.config.auth)?;

    let video = owned_video(state.videos.as_ref(), video_id, user_id, "view this video").await?;

    Ok(Json(signed_video(state.storage.as_ref(), video).await?))
}

/// Upload a thumbnail image for a video
pub async fn upload_thumbnail_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    request: Request<Body>,
) -> Result<Json<VideoResponse>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(request.headers(), &state.config.auth)?;

    info!("[POST /api/thumbnail_upload] video {} by user {}", video_id, user_id);

    let mut video = owned_video(
        state.videos.as_ref(),
        video_id,
        user_id,
        "upload a thumbnail",
    )
    .await?;

    let upload = receive_media(
        request,
        "thumbnail",
        state.config.max_thumbnail_size,
        |content_type| thumbnail_extension(content_type).is_some(),
    )
    .await?;

    let extension = thumbnail_extension(&upload.content_type)
        .ok_or_else(|| AppError::ClientInput("Unsupported media type".to_string()))?;
    let file_name = format!("{}{}", video_id, extension);

    // Written to a staging name first so a failed upload never clobbers the
    // current thumbnail.
    let staged = StagingFile::new(&state.config.assets_root, ".part");
    staged.write_from_stream(upload.into_stream()).await?;
    tokio::fs::rename(staged.path(), state.config.assets_root.join(&file_name))
        .await
        .dependency("Couldn't create file")?;

    video.thumbnail_url = Some(format!("{}/assets/{}", state.config.base_url, file_name));
    let video = state.videos.update_video(video).await?;

    Ok(Json(signed_video(state.storage.as_ref(), video).await?))
}

/// Upload, normalize and store the video file for a video
pub async fn upload_video_handler(
    State(state): State<Arc<AppState>>,
    Path(video_id): Path<String>,
    request: Request<Body>,
) -> Result<Json<VideoResponse>, AppError> {
    let start = Instant::now();
    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(request.headers(), &state.config.auth)?;

    owned_video(
        state.videos.as_ref(),
        video_id,
        user_id,
        "upload a video file",
    )
    .await?;

    info!("[POST /api/video_upload] ⏱️  START video {} by user {}", video_id, user_id);

    let upload = receive_media(request, "video", state.config.max_video_size, is_video_type).await?;
    let video = ingest_video(&state, video_id, user_id, upload).await?;
    let response = signed_video(state.storage.as_ref(), video).await?;

    info!(
        "[POST /api/video_upload] ✅ SUCCESS - video {} in {:.2}s",
        video_id,
        start.elapsed().as_secs_f64()
    );

    Ok(Json(response))
}
