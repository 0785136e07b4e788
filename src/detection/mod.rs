pub mod annotate;
pub mod edges;
pub mod heatmap;
pub mod model;
pub mod objects;
pub mod preprocessing;

pub use annotate::Annotator;
pub use edges::detect_edges;
pub use heatmap::{apply_colormap, render_heatmap};
pub use model::{DetectionBackend, DetectionModel, RawDetection};
pub use objects::{ObjectDetection, detect_objects};
