use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{error, info, warn};

use crate::config::Config;

/// Removes staging files older than `max_age`. Request guards delete their
/// own files; this only catches what a killed process left behind.
pub async fn sweep_staging_dir(dir: &Path, max_age: Duration) -> anyhow::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut deleted = 0;
    let mut size_freed = 0u64;
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        let metadata = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => continue,
            Err(e) => {
                warn!("[cleanup] Failed to get metadata for {:?}: {}", path, e);
                continue;
            }
        };

        let age = match metadata.modified().map(|m| now.duration_since(m)) {
            Ok(Ok(age)) => age,
            // Modified in the future or unsupported
            _ => continue,
        };

        if age <= max_age {
            continue;
        }

        match fs::remove_file(&path).await {
            Ok(()) => {
                deleted += 1;
                size_freed += metadata.len();
                info!(
                    "[cleanup] ✅ Deleted stale staging file: {:?} (age: {:.1} min)",
                    path,
                    age.as_secs_f64() / 60.0
                );
            }
            Err(e) => error!("[cleanup] ❌ Failed to delete {:?}: {}", path, e),
        }
    }

    if deleted > 0 {
        info!(
            "[cleanup] ✅ Sweep complete: {} files deleted, {:.2} MB freed",
            deleted,
            size_freed as f64 / 1024.0 / 1024.0
        );
    }

    Ok(deleted)
}

/// Start a background task that periodically sweeps the staging directory
pub fn start_cleanup_task(config: Arc<Config>) -> tokio::task::JoinHandle<()> {
    let max_age = Duration::from_secs(config.limits.staging_max_age_seconds);
    let cleanup_interval = Duration::from_secs(config.limits.cleanup_interval_seconds.max(1));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            "[cleanup] 🧹 Starting staging sweeper (interval: {:.1} min, max age: {:.1} min)",
            cleanup_interval.as_secs_f64() / 60.0,
            max_age.as_secs_f64() / 60.0
        );

        loop {
            interval.tick().await;

            if let Err(e) = sweep_staging_dir(&config.staging_dir, max_age).await {
                error!("[cleanup] Periodic sweep error: {}", e);
            }
        }
    })
}
