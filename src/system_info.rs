use std::path::Path;
use sysinfo::System;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Debug)]
pub struct SystemInfo {
    pub version: String,
    pub platform: String,
    pub arch: String,
    pub cpus: usize,
    pub cpu_model: String,
    pub memory_total_gb: f64,
    pub memory_free_gb: f64,
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
}

/// First line of `<binary> -version`, if the tool runs at all.
pub fn tool_version(binary: &Path) -> Option<String> {
    let output = std::process::Command::new(binary)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(str::to_string)
}

pub fn get_system_info(config: &Config) -> SystemInfo {
    let mut system = System::new();
    system.refresh_all();

    let cpu_model = system
        .cpus()
        .first()
        .map(|cpu| cpu.brand().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    SystemInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        cpus: system.cpus().len(),
        cpu_model,
        memory_total_gb: system.total_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
        memory_free_gb: system.free_memory() as f64 / 1024.0 / 1024.0 / 1024.0,
        ffmpeg: tool_version(&config.ffmpeg.ffmpeg_path),
        ffprobe: tool_version(&config.ffmpeg.ffprobe_path),
    }
}

pub fn print_startup_info(config: &Config) {
    let sys_info = get_system_info(config);

    info!("{}", "=".repeat(60));
    info!("🚀 Video Ingest Backend v{} starting", sys_info.version);
    info!("   Platform: {} ({})", sys_info.platform, sys_info.arch);
    info!("   CPUs: {} ({})", sys_info.cpus, sys_info.cpu_model);
    info!(
        "   Memory: {:.2} GB total, {:.2} GB free",
        sys_info.memory_total_gb, sys_info.memory_free_gb
    );
    info!("   FFmpeg: {}", sys_info.ffmpeg.as_deref().unwrap_or("not available"));
    info!("   FFprobe: {}", sys_info.ffprobe.as_deref().unwrap_or("not available"));
    info!("   Bucket: {} ({})", config.storage.bucket, config.storage.region);
    info!("   Assets Dir: {:?}", config.assets_root);
    info!("   Staging Dir: {:?}", config.staging_dir);
    info!("{}", "=".repeat(60));

    if sys_info.ffmpeg.is_none() || sys_info.ffprobe.is_none() {
        warn!("⚠️  ffmpeg/ffprobe not found; video uploads will fail");
    }
}
