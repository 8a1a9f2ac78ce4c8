use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use crate::{
    config::Config, media::MediaTools, repo::VideoRepository, storage::ObjectStorage,
    storage::StorageRef,
};

/// Allowed distance from an exact 16:9 or 9:16 ratio.
pub const ASPECT_TOLERANCE: f64 = 0.03;

/// A video record as owned by the persistence layer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Video {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub video: Option<StorageRef>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl Video {
    pub fn new(user_id: Uuid, title: String, description: String) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            title,
            description,
            thumbnail_url: None,
            video: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AspectRatio {
    Landscape,
    Portrait,
    Other,
}

impl AspectRatio {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        let ratio = f64::from(width) / f64::from(height);

        if (ratio - 16.0 / 9.0).abs() < ASPECT_TOLERANCE {
            AspectRatio::Landscape
        } else if (ratio - 9.0 / 16.0).abs() < ASPECT_TOLERANCE {
            AspectRatio::Portrait
        } else {
            AspectRatio::Other
        }
    }

    /// Storage folder the classification maps to.
    pub fn folder(self) -> &'static str {
        match self {
            AspectRatio::Landscape => "landscape",
            AspectRatio::Portrait => "portrait",
            AspectRatio::Other => "other",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub videos: Arc<dyn VideoRepository>,
    pub storage: Arc<dyn ObjectStorage>,
    pub media: Arc<dyn MediaTools>,
}

#[derive(Deserialize)]
pub struct CreateVideoRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// A record as returned to clients, with the storage reference swapped for a
/// signed URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct VideoResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub thumbnail_url: Option<String>,
    pub video_url: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl VideoResponse {
    pub fn new(video: Video, video_url: Option<String>) -> Self {
        Self {
            id: video.id,
            user_id: video.user_id,
            title: video.title,
            description: video.description,
            thumbnail_url: video.thumbnail_url,
            video_url,
            created_at: video.created_at,
            updated_at: video.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
