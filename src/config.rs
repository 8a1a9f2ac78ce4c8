use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub assets_root: Option<String>,
    pub staging_dir: Option<String>,
    pub max_thumbnail_size: Option<u64>,
    pub max_video_size: Option<u64>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub jwt_secret: Option<String>,
    pub issuer: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub staging_max_age_seconds: u64,
    pub cleanup_interval_seconds: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub auth: AuthSection,
    pub ffmpeg: Option<FfmpegConfig>,
    pub limits: Option<LimitsConfig>,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub base_url: String,
    pub assets_root: PathBuf,
    pub staging_dir: PathBuf,
    pub max_thumbnail_size: u64,
    pub max_video_size: u64,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub ffmpeg: FfmpegConfig,
    pub limits: LimitsConfig,
}

const DEFAULT_PORT: u16 = 8091;
const DEFAULT_MAX_THUMBNAIL_SIZE: u64 = 10 * 1024 * 1024;
const DEFAULT_MAX_VIDEO_SIZE: u64 = 1024 * 1024 * 1024;
const DEFAULT_ISSUER: &str = "video-ingest-access";

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            staging_max_age_seconds: 6 * 60 * 60,
            cleanup_interval_seconds: 15 * 60,
        }
    }
}

impl Config {
    /// Reads `config.toml` from the working directory if present, then lets
    /// environment variables override it.
    pub fn load() -> anyhow::Result<Self> {
        let base_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let config_path = base_dir.join("config.toml");
        let config_file = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<ConfigFile>(&content)?
        } else {
            ConfigFile::default()
        };

        Self::resolve(config_file, &base_dir, |name| std::env::var(name).ok())
    }

    fn resolve(
        file: ConfigFile,
        base_dir: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let string = |name: &str, from_file: Option<String>| {
            env(name).filter(|v| !v.is_empty()).or(from_file)
        };

        let port = env("PORT")
            .and_then(|p| p.parse().ok())
            .or(file.server.port)
            .unwrap_or(DEFAULT_PORT);

        let base_url = string("BASE_URL", file.server.base_url)
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let assets_root = resolve_dir(
            base_dir,
            string("ASSETS_ROOT", file.server.assets_root).unwrap_or_else(|| "assets".into()),
        );

        let staging_dir = resolve_dir(
            base_dir,
            string("STAGING_DIR", file.server.staging_dir)
                .unwrap_or_else(|| std::env::temp_dir().join("video-ingest").display().to_string()),
        );

        let max_thumbnail_size = file
            .server
            .max_thumbnail_size
            .unwrap_or(DEFAULT_MAX_THUMBNAIL_SIZE);

        let max_video_size = env("MAX_VIDEO_SIZE")
            .and_then(|v| v.parse().ok())
            .or(file.server.max_video_size)
            .unwrap_or(DEFAULT_MAX_VIDEO_SIZE);

        let storage = StorageConfig {
            bucket: string("S3_BUCKET", file.storage.bucket)
                .ok_or_else(|| anyhow::anyhow!("S3_BUCKET must be set"))?,
            region: string("S3_REGION", file.storage.region)
                .unwrap_or_else(|| "us-east-1".into()),
            endpoint: string("S3_ENDPOINT", file.storage.endpoint),
        };

        let auth = AuthConfig {
            jwt_secret: string("JWT_SECRET", file.auth.jwt_secret)
                .ok_or_else(|| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: file.auth.issuer.unwrap_or_else(|| DEFAULT_ISSUER.into()),
        };

        let mut ffmpeg = file.ffmpeg.unwrap_or_default();
        if let Some(path) = env("FFMPEG_PATH") {
            ffmpeg.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(path) = env("FFPROBE_PATH") {
            ffmpeg.ffprobe_path = PathBuf::from(path);
        }

        Ok(Self {
            port,
            base_url: base_url.trim_end_matches('/').to_string(),
            assets_root,
            staging_dir,
            max_thumbnail_size,
            max_video_size,
            storage,
            auth,
            ffmpeg,
            limits: file.limits.unwrap_or_default(),
        })
    }

    #[cfg(test)]
    pub fn for_tests(assets_root: PathBuf, staging_dir: PathBuf) -> Self {
        Self {
            port: DEFAULT_PORT,
            base_url: format!("http://localhost:{}", DEFAULT_PORT),
            assets_root,
            staging_dir,
            max_thumbnail_size: DEFAULT_MAX_THUMBNAIL_SIZE,
            max_video_size: DEFAULT_MAX_VIDEO_SIZE,
            storage: StorageConfig {
                bucket: "test-bucket".into(),
                region: "us-east-1".into(),
                endpoint: None,
            },
            auth: AuthConfig {
                jwt_secret: "test-secret".into(),
                issuer: DEFAULT_ISSUER.into(),
            },
            ffmpeg: FfmpegConfig::default(),
            limits: LimitsConfig::default(),
        }
    }
}

fn resolve_dir(base_dir: &Path, dir: String) -> PathBuf {
    let dir = PathBuf::from(dir);
    if dir.is_absolute() {
        dir
    } else {
        base_dir.join(dir)
    }
}
