mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from visionedge for tests
pub use visionedge::{
    AnalysisRequest, AppConfig, ClassFilter, DetectionBackend, EdgeMethod, EdgeParameters,
    Pipeline, RawDetection, UploadedImage, VisionError,
};
