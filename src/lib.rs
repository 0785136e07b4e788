pub mod cache;
pub mod config;
pub mod detection;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod validation;

pub use config::AppConfig;
pub use detection::{DetectionBackend, DetectionModel, RawDetection};
pub use error::{Result, VisionError};
pub use models::{
    BoundingBox, ClassFilter, Detection, DetectionSummary, EdgeMethod, EdgeParameters,
    PipelineResult, UploadedImage,
};
pub use pipeline::{AnalysisRequest, Pipeline, PipelineContext};
pub use validation::{ValidationReport, validate_image};
