//! Deployment settings, read from `VISIONEDGE_*` environment variables.

use crate::error::{Result, VisionError};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

pub const SUPPORTED_FORMATS: &[&str] = &["jpg", "jpeg", "png"];
pub const MAX_UPLOAD_SIZE: usize = 5 * 1024 * 1024;

/// System DejaVu font used for box labels when none is configured.
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// Effective settings; serialized to the debug log at start-up.
#[derive(Debug, Clone, Serialize)]
pub struct AppConfig {
    /// Detection model in `.rten` format
    pub model_path: PathBuf,
    /// Optional class-name file, one label per line. `None` uses COCO-80.
    pub labels_path: Option<PathBuf>,
    /// TrueType font for box labels
    pub font_path: Option<PathBuf>,
    /// Longest allowed image side; larger images are downscaled
    pub max_image_dimension: u32,
    pub supported_formats: Vec<String>,
    /// Upload limit in bytes
    pub max_upload_size: usize,
    /// Number of labels pre-selected when the user picks no classes
    pub default_classes_to_show: usize,
    pub cache_dir: PathBuf,
    pub cache_timeout_secs: u64,
    pub log_level: String,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("yolov8n.rten"),
            labels_path: None,
            font_path: Some(PathBuf::from(DEFAULT_FONT_PATH)),
            max_image_dimension: 800,
            supported_formats: SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
            max_upload_size: MAX_UPLOAD_SIZE,
            default_classes_to_show: 3,
            cache_dir: PathBuf::from("cache"),
            cache_timeout_secs: 3600,
            log_level: "info".to_string(),
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        }
    }
}

impl AppConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup("VISIONEDGE_MODEL_PATH") {
            config.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("VISIONEDGE_LABELS_PATH") {
            config.labels_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("VISIONEDGE_FONT_PATH") {
            config.font_path = if v.is_empty() { None } else { Some(PathBuf::from(v)) };
        }
        if let Some(v) = lookup("VISIONEDGE_MAX_IMAGE_DIMENSION") {
            config.max_image_dimension = parse_var("VISIONEDGE_MAX_IMAGE_DIMENSION", &v)?;
        }
        if let Some(v) = lookup("VISIONEDGE_MAX_UPLOAD_SIZE") {
            config.max_upload_size = parse_var("VISIONEDGE_MAX_UPLOAD_SIZE", &v)?;
        }
        if let Some(v) = lookup("VISIONEDGE_DEFAULT_CLASSES") {
            config.default_classes_to_show = parse_var("VISIONEDGE_DEFAULT_CLASSES", &v)?;
        }
        if let Some(v) = lookup("VISIONEDGE_CACHE_DIR") {
            config.cache_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("VISIONEDGE_CACHE_TIMEOUT_SECS") {
            config.cache_timeout_secs = parse_var("VISIONEDGE_CACHE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("VISIONEDGE_LOG_LEVEL") {
            config.log_level = v;
        }
        if let Some(v) = lookup("VISIONEDGE_CONFIDENCE") {
            config.confidence_threshold = parse_var("VISIONEDGE_CONFIDENCE", &v)?;
        }
        if let Some(v) = lookup("VISIONEDGE_IOU") {
            config.iou_threshold = parse_var("VISIONEDGE_IOU", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_upload_size == 0 {
            return Err(VisionError::Configuration(
                "Maximum upload size must be non-zero".to_string(),
            ));
        }
        if self.max_image_dimension == 0 {
            return Err(VisionError::Configuration(
                "Maximum image dimension must be non-zero".to_string(),
            ));
        }
        if self.supported_formats.is_empty() {
            return Err(VisionError::Configuration(
                "At least one image format must be supported".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(VisionError::Configuration(format!(
                "Confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            return Err(VisionError::Configuration(format!(
                "IoU threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }
        Ok(())
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_secs(self.cache_timeout_secs)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        VisionError::Configuration(format!("Invalid value {:?} for {}: {}", value, key, e))
    })
}
