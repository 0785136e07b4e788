//! Error types shared by every pipeline stage.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    /// The upload was rejected before any pixel was touched.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Edge detection, heatmap rendering, decoding or inference failed.
    #[error("Processing error: {0}")]
    Processing(String),

    /// Missing model file, unreadable settings and the like.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl VisionError {
    /// Message without the kind prefix, suitable for showing to the user.
    pub fn message(&self) -> String {
        match self {
            VisionError::Validation(msg)
            | VisionError::Processing(msg)
            | VisionError::Configuration(msg) => msg.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VisionError>;
