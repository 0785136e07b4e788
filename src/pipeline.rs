use crate::cache;
use crate::config::AppConfig;
use crate::detection::{self, Annotator, DetectionBackend, preprocessing};
use crate::error::{Result, VisionError};
use crate::logging::timed;
use crate::models::{ClassFilter, EdgeParameters, PipelineResult, UploadedImage};
use crate::validation::validate_image;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Span, info, info_span, warn};
use uuid::Uuid;

/// Per-request logging context handed to every stage.
#[derive(Clone, Debug)]
pub struct PipelineContext {
    pub request_id: Uuid,
    pub span: Span,
}

impl PipelineContext {
    pub fn new(filename: &str) -> Self {
        let request_id = Uuid::new_v4();
        let span = info_span!("request", id = %request_id, filename);
        Self { request_id, span }
    }
}

/// What the user picked for this run.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub edge: EdgeParameters,
    pub classes: ClassFilter,
}

/// Validate → grayscale → edges → heatmap, and object detection on the
/// colour image. All artifacts or an error, never a partial result.
pub struct Pipeline {
    config: Arc<AppConfig>,
    backend: Arc<dyn DetectionBackend>,
    annotator: Annotator,
    export_dir: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(config: Arc<AppConfig>, backend: Arc<dyn DetectionBackend>) -> Self {
        let annotator = Annotator::from_font_path(config.font_path.as_deref());
        Self {
            config,
            backend,
            annotator,
            export_dir: None,
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Write every run's images under `output_dir`, one subdirectory per request.
    pub fn with_export(mut self, output_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&output_dir).map_err(|e| {
            VisionError::Configuration(format!(
                "Cannot create output directory {}: {}",
                output_dir.display(),
                e
            ))
        })?;
        self.export_dir = Some(output_dir);
        Ok(self)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn class_names(&self) -> &[String] {
        self.backend.class_names()
    }

    /// The pre-selected allow-list: the first `default_classes_to_show` labels.
    pub fn default_class_filter(&self) -> ClassFilter {
        ClassFilter::only(
            self.class_names()
                .iter()
                .take(self.config.default_classes_to_show)
                .cloned(),
        )
    }

    /// Allow-list for the user's class names. Names the model does not know
    /// are rejected so a typo cannot silently hide every box.
    pub fn class_filter_for<I, S>(&self, names: I) -> Result<ClassFilter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = self.class_names();
        let mut selected = Vec::new();
        let mut unknown = Vec::new();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if known.iter().any(|k| k == name) {
                selected.push(name.to_string());
            } else {
                unknown.push(name.to_string());
            }
        }

        if !unknown.is_empty() {
            warn!(operation = "select_classes", unknown = ?unknown, "Unknown class names");
            return Err(VisionError::Validation(format!(
                "Unknown class names: {}. Available classes: {}",
                unknown.join(", "),
                known.join(", ")
            )));
        }

        Ok(ClassFilter::only(selected))
    }

    pub fn run(&self, upload: Option<&UploadedImage>, request: &AnalysisRequest) -> Result<PipelineResult> {
        let filename = upload.map(|u| u.filename.as_str()).unwrap_or_default();
        let context = PipelineContext::new(filename);
        let started = Instant::now();

        let report = validate_image(upload, &self.config);
        let upload = match upload {
            Some(upload) if report.valid => upload,
            _ => {
                let _entered = context.span.enter();
                warn!(operation = "validate_image", "{}", report.message);
                return Err(VisionError::Validation(report.message));
            }
        };

        let (original, _) = timed(&context, "decode_image", || {
            let rgb = preprocessing::decode_upload(upload)?;
            Ok(preprocessing::limit_dimension(rgb, self.config.max_image_dimension))
        })?;
        let gray = preprocessing::to_grayscale(&original);

        let (edge_map, _) = timed(&context, "apply_edge_detection", || {
            detection::detect_edges(&request.edge, &gray)
        })?;

        let (heatmap, _) = timed(&context, "generate_heatmap", || {
            Ok(detection::apply_colormap(&edge_map))
        })?;

        let (objects, _) = timed(&context, "detect_objects", || {
            detection::detect_objects(self.backend.as_ref(), &original, &request.classes, &self.annotator)
        })?;

        let mut result = PipelineResult {
            filename: upload.filename.clone(),
            original,
            edge_map,
            heatmap,
            annotated: objects.annotated,
            detections: objects.detections,
            counts: objects.counts,
            elapsed_seconds: objects.elapsed_seconds,
            edge_parameters: request.edge,
            export_dir: None,
        };

        if let Some(root) = &self.export_dir {
            let (dir, _) = timed(&context, "export_artifacts", || {
                cache::save_artifacts(root, context.request_id, &result)
            })?;
            result.export_dir = Some(dir);
        }

        let _entered = context.span.enter();
        info!(
            detections = result.detections.len(),
            total_ms = started.elapsed().as_secs_f64() * 1000.0,
            "Pipeline finished"
        );

        Ok(result)
    }
}
