use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, DependencyContext},
    models::{AppState, Video},
    repo::set_video_reference,
    staging::StagingFile,
    storage::{generate_video_key, StorageRef},
    upload::MediaUpload,
};

/// Runs one video upload through staging, inspection, fast-start remux,
/// object storage and the metadata update, strictly in that order.
///
/// Every staging file is removed before this returns, on success and on
/// every failure path.
pub async fn ingest_video(
    state: &AppState,
    video_id: Uuid,
    user_id: Uuid,
    upload: MediaUpload,
) -> Result<Video, AppError> {
    let start = Instant::now();
    let content_type = upload.content_type.clone();

    let staged = StagingFile::new(&state.config.staging_dir, ".mp4");
    let size = staged.write_from_stream(upload.into_stream()).await?;
    info!(
        %video_id,
        size_bytes = size,
        "[ingest] 📦 staged {:.2} MB",
        size as f64 / 1024.0 / 1024.0
    );

    let aspect = state.media.inspect(staged.path()).await?;
    let processed = state.media.normalize(&staged).await?;

    let location = StorageRef::new(state.storage.bucket(), generate_video_key(aspect))
        .dependency("Couldn't build storage reference")?;

    let body = processed.open().await?;
    state.storage.put_file(&location, &content_type, body).await?;

    let video = set_video_reference(state.videos.as_ref(), video_id, user_id, location).await?;

    for file in [processed, staged] {
        if let Err(e) = file.cleanup().await {
            warn!(%video_id, "[ingest] failed to remove staging file: {}", e);
        }
    }

    info!(
        %video_id,
        %user_id,
        ?aspect,
        elapsed_s = start.elapsed().as_secs_f64(),
        "[ingest] ✅ stored {}",
        video.video.as_ref().map(|v| v.key()).unwrap_or_default()
    );

    Ok(video)
}
