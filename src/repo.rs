use async_trait::async_trait;
use std::{collections::HashMap, time::SystemTime};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{error::AppError, models::Video, storage::StorageRef};

/// Persistence layer for video records.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    async fn create_video(&self, video: Video) -> Result<Video, AppError>;

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError>;

    /// Replaces the stored record and returns it as stored. Last write wins.
    async fn update_video(&self, video: Video) -> Result<Video, AppError>;
}

#[derive(Default)]
pub struct InMemoryVideoRepository {
    videos: RwLock<HashMap<Uuid, Video>>,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn create_video(&self, video: Video) -> Result<Video, AppError> {
        self.videos.write().await.insert(video.id, video.clone());
        Ok(video)
    }

    async fn get_video(&self, id: Uuid) -> Result<Option<Video>, AppError> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update_video(&self, mut video: Video) -> Result<Video, AppError> {
        let mut videos = self.videos.write().await;
        if !videos.contains_key(&video.id) {
            return Err(AppError::NotFound("Couldn't find video".to_string()));
        }
        video.updated_at = SystemTime::now();
        videos.insert(video.id, video.clone());
        Ok(video)
    }
}

/// Loads a record and checks that `user_id` owns it.
pub async fn owned_video(
    repo: &dyn VideoRepository,
    video_id: Uuid,
    user_id: Uuid,
    action: &str,
) -> Result<Video, AppError> {
    let video = repo
        .get_video(video_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Couldn't find video".to_string()))?;

    if video.user_id != user_id {
        return Err(AppError::Authorization(format!(
            "You are not authorized to {} for this video",
            action
        )));
    }

    Ok(video)
}

/// Re-reads the authoritative record, checks ownership, then stores the new
/// video reference.
pub async fn set_video_reference(
    repo: &dyn VideoRepository,
    video_id: Uuid,
    user_id: Uuid,
    location: StorageRef,
) -> Result<Video, AppError> {
    let mut video = owned_video(repo, video_id, user_id, "upload a video file").await?;
    video.video = Some(location);
    repo.update_video(video).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (InMemoryVideoRepository, Video) {
        let repo = InMemoryVideoRepository::new();
        let video = repo
            .create_video(Video::new(Uuid::new_v4(), "first".into(), String::new()))
            .await
            .unwrap();
        (repo, video)
    }

    #[tokio::test]
    async fn owner_can_set_reference() {
        let (repo, video) = seeded().await;
        let location = StorageRef::new("media", "landscape/abc.mp4").unwrap();

        let updated = set_video_reference(&repo, video.id, video.user_id, location.clone())
            .await
            .unwrap();
        assert_eq!(updated.video.as_ref(), Some(&location));

        let stored = repo.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(stored.video, Some(location));
    }

    #[tokio::test]
    async fn non_owner_leaves_record_unchanged() {
        let (repo, video) = seeded().await;
        let location = StorageRef::new("media", "landscape/abc.mp4").unwrap();

        let err = set_video_reference(&repo, video.id, Uuid::new_v4(), location)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let stored = repo.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(stored, video);
    }

    #[tokio::test]
    async fn unknown_video_is_not_found() {
        let (repo, video) = seeded().await;
        let location = StorageRef::new("media", "other/abc.mp4").unwrap();

        let err = set_video_reference(&repo, Uuid::new_v4(), video.user_id, location)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn last_write_wins() {
        let (repo, video) = seeded().await;
        let first = StorageRef::new("media", "landscape/one.mp4").unwrap();
        let second = StorageRef::new("media", "portrait/two.mp4").unwrap();

        set_video_reference(&repo, video.id, video.user_id, first).await.unwrap();
        set_video_reference(&repo, video.id, video.user_id, second.clone())
            .await
            .unwrap();

        let stored = repo.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(stored.video, Some(second));
    }
}
