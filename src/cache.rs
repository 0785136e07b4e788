//! Exported artifacts and their age-based cleanup.

use crate::error::{Result, VisionError};
use crate::models::PipelineResult;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{error, info};
use uuid::Uuid;

/// Save the four images of `result` as PNG under `root/<id>/`.
pub fn save_artifacts(root: &Path, id: Uuid, result: &PipelineResult) -> Result<PathBuf> {
    let dir = root.join(id.to_string());
    std::fs::create_dir_all(&dir).map_err(|e| {
        error!(operation = "save_artifacts", dir = %dir.display(), "Failed to create export directory: {}", e);
        VisionError::Processing(format!(
            "Failed to create export directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    let save = |name: &str, outcome: image::ImageResult<()>| {
        outcome.map_err(|e| {
            error!(operation = "save_artifacts", file = name, "Failed to save artifact: {}", e);
            VisionError::Processing(format!("Failed to save {}: {}", name, e))
        })
    };

    save("original.png", result.original.save(dir.join("original.png")))?;
    save("edges.png", result.edge_map.save(dir.join("edges.png")))?;
    save("heatmap.png", result.heatmap.save(dir.join("heatmap.png")))?;
    save("detections.png", result.annotated.save(dir.join("detections.png")))?;

    Ok(dir)
}

/// Remove entries of `dir` older than `timeout`. Returns how many went.
pub fn cleanup_expired(dir: &Path, timeout: Duration) -> Result<usize> {
    cleanup_expired_at(dir, timeout, SystemTime::now())
}

/// Same as [`cleanup_expired`] with an explicit notion of "now".
///
/// A missing directory is not an error. Entries that cannot be inspected
/// or removed are logged and skipped.
pub fn cleanup_expired_at(dir: &Path, timeout: Duration, now: SystemTime) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let entries = std::fs::read_dir(dir).map_err(|e| {
        error!(operation = "cleanup_cache", dir = %dir.display(), "Cache cleanup failed: {}", e);
        VisionError::Processing(format!(
            "Failed to read cache directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                error!(operation = "cleanup_cache", "Cache cleanup failed: {}", e);
                continue;
            }
        };

        match remove_if_expired(&path, timeout, now) {
            Ok(true) => {
                info!(path = %path.display(), "Removed expired cache entry");
                removed += 1;
            }
            Ok(false) => {}
            Err(e) => error!(operation = "cleanup_cache", path = %path.display(), "Cache cleanup failed: {}", e),
        }
    }

    Ok(removed)
}

fn remove_if_expired(path: &Path, timeout: Duration, now: SystemTime) -> std::io::Result<bool> {
    let metadata = std::fs::metadata(path)?;
    let age = now
        .duration_since(metadata.modified()?)
        .unwrap_or(Duration::ZERO);
    if age <= timeout {
        return Ok(false);
    }

    if metadata.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(true)
}
