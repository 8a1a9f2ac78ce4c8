use async_trait::async_trait;
use http::Method;
use object_store::{
    aws::{AmazonS3, AmazonS3Builder},
    buffered::BufWriter,
    path::Path as ObjectPath,
    signer::Signer,
    Attribute, Attributes,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc, time::Duration, time::Instant};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{error, info};

use crate::{
    config::StorageConfig,
    error::{AppError, DependencyContext},
    models::{AspectRatio, Video, VideoResponse},
};

/// Lifetime of a signed retrieval URL.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(60 * 60);

const REFERENCE_SEPARATOR: char = ',';

/// Identifies one object in the storage backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRef {
    bucket: String,
    key: String,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid storage reference: {0}")]
pub struct InvalidStorageRef(String);

impl StorageRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, InvalidStorageRef> {
        let bucket = bucket.into();
        let key = key.into();

        for (name, part) in [("bucket", &bucket), ("key", &key)] {
            if part.is_empty() {
                return Err(InvalidStorageRef(format!("{} is empty", name)));
            }
            if part.contains(REFERENCE_SEPARATOR) {
                return Err(InvalidStorageRef(format!(
                    "{} contains '{}'",
                    name, REFERENCE_SEPARATOR
                )));
            }
        }

        Ok(Self { bucket, key })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Legacy `bucket,key` encoding.
impl fmt::Display for StorageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.bucket, REFERENCE_SEPARATOR, self.key)
    }
}

impl FromStr for StorageRef {
    type Err = InvalidStorageRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(REFERENCE_SEPARATOR).collect();
        match parts.as_slice() {
            [bucket, key] => StorageRef::new(*bucket, *key),
            _ => Err(InvalidStorageRef(format!(
                "expected 2 components, found {}",
                parts.len()
            ))),
        }
    }
}

/// Builds `{folder}/{64 hex chars}.mp4` for a freshly classified upload.
pub fn generate_video_key(aspect: AspectRatio) -> String {
    let mut random_bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    format!("{}/{}.mp4", aspect.folder(), hex::encode(random_bytes))
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Streams `file` from its current position to the object named by
    /// `location`.
    async fn put_file(
        &self,
        location: &StorageRef,
        content_type: &str,
        file: File,
    ) -> Result<(), AppError>;

    /// Produces a time-limited GET URL for `location`.
    async fn presign_get(&self, location: &StorageRef, ttl: Duration) -> Result<String, AppError>;

    /// Bucket new uploads go to.
    fn bucket(&self) -> &str;
}

/// Signs a reference held in its legacy string form. Malformed input never
/// reaches the backend.
#[allow(dead_code)]
pub async fn sign_encoded_reference(
    storage: &dyn ObjectStorage,
    encoded: &str,
) -> Result<String, AppError> {
    let location: StorageRef = encoded
        .parse()
        .dependency("Couldn't decode video reference")?;
    storage.presign_get(&location, SIGNED_URL_TTL).await
}

/// Turns a stored record into its client view.
pub async fn signed_video(storage: &dyn ObjectStorage, video: Video) -> Result<VideoResponse, AppError> {
    let video_url = match &video.video {
        Some(location) => Some(storage.presign_get(location, SIGNED_URL_TTL).await?),
        None => None,
    };
    Ok(VideoResponse::new(video, video_url))
}

/// S3-compatible backend built on `object_store`.
pub struct S3Storage {
    builder: AmazonS3Builder,
    store: Arc<AmazonS3>,
    bucket: String,
}

impl S3Storage {
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let mut builder = AmazonS3Builder::from_env().with_region(config.region.clone());

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder.clone().with_bucket_name(config.bucket.clone()).build()?;

        Ok(Self {
            builder,
            store: Arc::new(store),
            bucket: config.bucket.clone(),
        })
    }

    fn store_for(&self, bucket: &str) -> Result<Arc<AmazonS3>, AppError> {
        if bucket == self.bucket {
            return Ok(self.store.clone());
        }

        let store = self
            .builder
            .clone()
            .with_bucket_name(bucket)
            .build()
            .dependency("Couldn't configure storage client")?;
        Ok(Arc::new(store))
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_file(
        &self,
        location: &StorageRef,
        content_type: &str,
        mut file: File,
    ) -> Result<(), AppError> {
        let start = Instant::now();
        let store = self.store_for(location.bucket())?;

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());

        let mut writer = BufWriter::new(store, ObjectPath::from(location.key()))
            .with_attributes(attributes);

        let copied = tokio::io::copy(&mut file, &mut writer).await;
        let size = match copied {
            Ok(size) => size,
            Err(e) => {
                error!(
                    error = %e,
                    bucket = %location.bucket(),
                    key = %location.key(),
                    "[storage] ❌ upload failed"
                );
                let _ = writer.abort().await;
                return Err(AppError::dependency("Couldn't upload video file", e));
            }
        };

        writer.shutdown().await.map_err(|e| {
            error!(
                error = %e,
                bucket = %location.bucket(),
                key = %location.key(),
                size_bytes = size,
                "[storage] ❌ upload failed"
            );
            AppError::dependency("Couldn't upload video file", e)
        })?;

        info!(
            bucket = %location.bucket(),
            key = %location.key(),
            size_bytes = size,
            elapsed_s = start.elapsed().as_secs_f64(),
            "[storage] ✅ upload complete"
        );

        Ok(())
    }

    async fn presign_get(&self, location: &StorageRef, ttl: Duration) -> Result<String, AppError> {
        let store = self.store_for(location.bucket())?;
        let url = store
            .signed_url(Method::GET, &ObjectPath::from(location.key()), ttl)
            .await
            .dependency("Couldn't sign video URL")?;
        Ok(url.to_string())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
