use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{
    config::FfmpegConfig,
    error::{AppError, DependencyContext},
    models::AspectRatio,
    staging::StagingFile,
};

/// External media tooling used by the ingest pipeline.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Classifies the first video stream of the file at `path`.
    async fn inspect(&self, path: &Path) -> Result<AspectRatio, AppError>;

    /// Remuxes `input` for progressive playback into a sibling staging file.
    async fn normalize(&self, input: &StagingFile) -> Result<StagingFile, AppError>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
}

/// Decodes `ffprobe -print_format json -show_streams` output.
pub fn classify_probe_output(output: &[u8]) -> anyhow::Result<AspectRatio> {
    let probe: ProbeOutput =
        serde_json::from_slice(output).context("Unexpected ffprobe output")?;

    Ok(probe
        .streams
        .first()
        .map(|stream| AspectRatio::from_dimensions(stream.width, stream.height))
        .unwrap_or(AspectRatio::Other))
}

pub struct Ffmpeg {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl Ffmpeg {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }
}

#[async_trait]
impl MediaTools for Ffmpeg {
    async fn inspect(&self, path: &Path) -> Result<AspectRatio, AppError> {
        let start = Instant::now();

        let output = Command::new(&self.ffprobe)
            .arg("-v")
            .arg("error")
            .arg("-select_streams")
            .arg("v:0")
            .arg("-print_format")
            .arg("json")
            .arg("-show_streams")
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .dependency("Failed to execute ffprobe")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::dependency(
                "Couldn't get video aspect ratio",
                anyhow::anyhow!("ffprobe failed ({}): {}", output.status, stderr.trim()),
            ));
        }

        let aspect = classify_probe_output(&output.stdout)
            .dependency("Couldn't get video aspect ratio")?;

        debug!(
            path = %path.display(),
            ?aspect,
            elapsed_s = start.elapsed().as_secs_f64(),
            "[ffprobe] classified"
        );

        Ok(aspect)
    }

    async fn normalize(&self, input: &StagingFile) -> Result<StagingFile, AppError> {
        let start = Instant::now();
        let output_file = input.sibling(".processing");

        let output = Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(input.path())
            .arg("-c")
            .arg("copy")
            .arg("-movflags")
            .arg("faststart")
            .arg("-f")
            .arg("mp4")
            .arg(output_file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .dependency("Failed to execute ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::dependency(
                "Couldn't process video file",
                anyhow::anyhow!("ffmpeg failed ({}): {}", output.status, stderr.trim()),
            ));
        }

        info!(
            input = %input.path().display(),
            elapsed_s = start.elapsed().as_secs_f64(),
            "[ffmpeg] ✓ remuxed for fast start"
        );

        Ok(output_file)
    }
}
