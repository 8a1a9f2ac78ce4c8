//! Deterministic stand-ins for ffmpeg and object storage, plus request
//! builders shared by the unit tests.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Request,
    },
};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::{
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tempfile::TempDir;
use tokio::{fs::File, io::AsyncReadExt};
use uuid::Uuid;

use crate::{
    auth::Claims,
    config::Config,
    error::{AppError, DependencyContext},
    media::MediaTools,
    models::{AppState, AspectRatio, Video},
    repo::{InMemoryVideoRepository, VideoRepository},
    staging::StagingFile,
    storage::{ObjectStorage, StorageRef},
};

pub const BOUNDARY: &str = "X-VIDEO-INGEST-BOUNDARY";

pub fn make_token(user_id: Uuid, secret: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();
    let claims = Claims {
        iss: "video-ingest-access".into(),
        sub: user_id.to_string(),
        iat: now,
        exp: now + 3600,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Builds a multipart POST. Each part is `(name, content type, body)`.
pub fn multipart_request(
    uri: &str,
    token: Option<&str>,
    parts: &[(&str, Option<&str>, &[u8])],
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, content_type, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match content_type {
            Some(content_type) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\n",
                        name
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

enum MediaBehavior {
    Classify(AspectRatio),
    FailInspect,
    FailNormalize,
}

pub struct FakeMedia(MediaBehavior);

impl FakeMedia {
    pub fn classifying(aspect: AspectRatio) -> Self {
        FakeMedia(MediaBehavior::Classify(aspect))
    }

    pub fn failing_inspect() -> Self {
        FakeMedia(MediaBehavior::FailInspect)
    }

    pub fn failing_normalize() -> Self {
        FakeMedia(MediaBehavior::FailNormalize)
    }
}

#[async_trait]
impl MediaTools for FakeMedia {
    async fn inspect(&self, _path: &Path) -> Result<AspectRatio, AppError> {
        match self.0 {
            MediaBehavior::Classify(aspect) => Ok(aspect),
            MediaBehavior::FailNormalize => Ok(AspectRatio::Other),
            MediaBehavior::FailInspect => Err(AppError::dependency(
                "Couldn't get video aspect ratio",
                anyhow::anyhow!("ffprobe failed: invalid data found"),
            )),
        }
    }

    async fn normalize(&self, input: &StagingFile) -> Result<StagingFile, AppError> {
        let output = input.sibling(".processing");
        let data = tokio::fs::read(input.path())
            .await
            .dependency("Couldn't read staged file")?;

        if let MediaBehavior::FailNormalize = self.0 {
            // Leave a partial output behind to prove it gets removed
            tokio::fs::write(output.path(), b"partial")
                .await
                .dependency("Couldn't write output")?;
            return Err(AppError::dependency(
                "Couldn't process video file",
                anyhow::anyhow!("ffmpeg failed: moov atom not found"),
            ));
        }

        let mut remuxed = b"faststart:".to_vec();
        remuxed.extend_from_slice(&data);
        tokio::fs::write(output.path(), remuxed)
            .await
            .dependency("Couldn't write output")?;
        Ok(output)
    }
}

#[derive(Clone, Debug)]
pub struct PutRecord {
    pub bucket: String,
    pub key: String,
    pub content_type: String,
    pub body: Vec<u8>,
}

#[derive(Default)]
pub struct FakeStorage {
    puts: Mutex<Vec<PutRecord>>,
    sign_calls: AtomicUsize,
    fail_puts: bool,
}

impl FakeStorage {
    pub fn failing_puts() -> Self {
        Self {
            fail_puts: true,
            ..Self::default()
        }
    }

    pub fn puts(&self) -> Vec<PutRecord> {
        self.puts.lock().unwrap().clone()
    }

    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn put_file(
        &self,
        location: &StorageRef,
        content_type: &str,
        mut file: File,
    ) -> Result<(), AppError> {
        if self.fail_puts {
            return Err(AppError::dependency(
                "Couldn't upload video file",
                anyhow::anyhow!("connection reset by peer"),
            ));
        }

        let mut body = Vec::new();
        file.read_to_end(&mut body)
            .await
            .dependency("Couldn't read processed video file")?;
        self.puts.lock().unwrap().push(PutRecord {
            bucket: location.bucket().to_string(),
            key: location.key().to_string(),
            content_type: content_type.to_string(),
            body,
        });
        Ok(())
    }

    async fn presign_get(&self, location: &StorageRef, ttl: Duration) -> Result<String, AppError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://signed.test/{}/{}?ttl={}",
            location.bucket(),
            location.key(),
            ttl.as_secs()
        ))
    }

    fn bucket(&self) -> &str {
        "test-bucket"
    }
}

/// App state over temp directories with one seeded video.
pub struct TestApp {
    pub state: AppState,
    pub storage: Arc<FakeStorage>,
    pub video: Video,
    pub token: String,
    assets: TempDir,
    staging: TempDir,
}

impl TestApp {
    pub async fn new(media: FakeMedia) -> Self {
        Self::with_storage(media, FakeStorage::default()).await
    }

    pub async fn with_storage(media: FakeMedia, storage: FakeStorage) -> Self {
        let assets = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let config = Config::for_tests(assets.path().to_path_buf(), staging.path().to_path_buf());

        let videos = Arc::new(InMemoryVideoRepository::new());
        let video = videos
            .create_video(Video::new(Uuid::new_v4(), "test video".into(), String::new()))
            .await
            .unwrap();
        let token = make_token(video.user_id, &config.auth.jwt_secret);

        let storage = Arc::new(storage);
        let state = AppState {
            config,
            videos,
            storage: storage.clone(),
            media: Arc::new(media),
        };

        Self {
            state,
            storage,
            video,
            token,
            assets,
            staging,
        }
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging.path()).unwrap().count() == 0
    }

    pub fn asset_files(&self) -> Vec<String> {
        std::fs::read_dir(self.assets.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }
}
