use clap::ValueEnum;
use image::{GrayImage, RgbImage};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

/// Raw upload as received from the front end.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub filename: String,
    size: usize,
}

impl UploadedImage {
    pub fn new(bytes: Vec<u8>, filename: impl Into<String>) -> Self {
        let size = bytes.len();
        Self {
            bytes,
            filename: filename.into(),
            size,
        }
    }

    /// Read a file from disk, keeping only its final path component as the name.
    ///
    /// Files larger than `max_bytes` are not read: the upload keeps the
    /// on-disk size and no content, so validation rejects it on size
    /// without the whole file ever being loaded.
    pub fn from_path(path: &Path, max_bytes: usize) -> std::io::Result<Self> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let size = usize::try_from(std::fs::metadata(path)?.len()).unwrap_or(usize::MAX);
        if size > max_bytes {
            return Ok(Self {
                bytes: Vec::new(),
                filename,
                size,
            });
        }

        Ok(Self::new(std::fs::read(path)?, filename))
    }

    /// Declared size in bytes, which for an oversized file is its size on disk.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Lower-cased extension without the leading dot.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
pub enum EdgeMethod {
    Canny,
    Sobel,
    Laplacian,
}

impl fmt::Display for EdgeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeMethod::Canny => "Canny",
            EdgeMethod::Sobel => "Sobel",
            EdgeMethod::Laplacian => "Laplacian",
        };
        f.write_str(name)
    }
}

/// Filter settings; exactly one variant per request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum EdgeParameters {
    Canny { threshold1: f32, threshold2: f32 },
    Sobel { kernel_size: u32 },
    Laplacian { kernel_size: u32 },
}

impl EdgeParameters {
    pub const THRESHOLD_MAX: f32 = 500.0;
    pub const KERNEL_MIN: u32 = 3;
    pub const KERNEL_MAX: u32 = 15;

    /// Default slider positions for a method.
    pub fn default_for(method: EdgeMethod) -> Self {
        match method {
            EdgeMethod::Canny => EdgeParameters::Canny {
                threshold1: 100.0,
                threshold2: 200.0,
            },
            EdgeMethod::Sobel => EdgeParameters::Sobel { kernel_size: 3 },
            EdgeMethod::Laplacian => EdgeParameters::Laplacian { kernel_size: 3 },
        }
    }

    pub fn method(&self) -> EdgeMethod {
        match self {
            EdgeParameters::Canny { .. } => EdgeMethod::Canny,
            EdgeParameters::Sobel { .. } => EdgeMethod::Sobel,
            EdgeParameters::Laplacian { .. } => EdgeMethod::Laplacian,
        }
    }

    /// Check ranges: thresholds in [0, 500], kernels odd in [3, 15].
    pub fn validate(&self) -> Result<(), String> {
        match *self {
            EdgeParameters::Canny {
                threshold1,
                threshold2,
            } => {
                for (name, value) in [("threshold1", threshold1), ("threshold2", threshold2)] {
                    if !(0.0..=Self::THRESHOLD_MAX).contains(&value) {
                        return Err(format!(
                            "Canny {} must be within [0, {}], got {}",
                            name,
                            Self::THRESHOLD_MAX,
                            value
                        ));
                    }
                }
                Ok(())
            }
            EdgeParameters::Sobel { kernel_size } | EdgeParameters::Laplacian { kernel_size } => {
                if kernel_size < Self::KERNEL_MIN
                    || kernel_size > Self::KERNEL_MAX
                    || kernel_size % 2 == 0
                {
                    return Err(format!(
                        "{} kernel size must be odd and within [{}, {}], got {}",
                        self.method(),
                        Self::KERNEL_MIN,
                        Self::KERNEL_MAX,
                        kernel_size
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Axis-aligned box in pixel coordinates, `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    /// Returns `None` for empty or inverted boxes.
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Self> {
        if x1 < x2 && y1 < y2 {
            Some(Self { x1, y1, x2, y2 })
        } else {
            None
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub class_name: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    /// Text drawn above the box, e.g. `"person 0.87"`.
    pub fn label(&self) -> String {
        format!("{} {:.2}", self.class_name, self.confidence)
    }
}

/// Per-class detection counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DetectionSummary {
    counts: BTreeMap<String, usize>,
}

impl DetectionSummary {
    pub fn from_detections(detections: &[Detection]) -> Self {
        let mut summary = Self::default();
        for detection in detections {
            summary.record(&detection.class_name);
        }
        summary
    }

    pub fn record(&mut self, class_name: &str) {
        *self.counts.entry(class_name.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, class_name: &str) -> usize {
        self.counts.get(class_name).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Which detector classes survive filtering.
///
/// `Only` with an empty set keeps nothing; use `All` to disable filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassFilter {
    All,
    Only(HashSet<String>),
}

impl ClassFilter {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClassFilter::Only(names.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, class_name: &str) -> bool {
        match self {
            ClassFilter::All => true,
            ClassFilter::Only(names) => names.contains(class_name),
        }
    }
}

/// Everything one request produces.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub filename: String,
    pub original: RgbImage,
    pub edge_map: GrayImage,
    pub heatmap: RgbImage,
    pub annotated: RgbImage,
    pub detections: Vec<Detection>,
    pub counts: DetectionSummary,
    /// Wall-clock seconds spent in inference and annotation
    pub elapsed_seconds: f64,
    pub edge_parameters: EdgeParameters,
    /// Where the images were written, if export was enabled
    pub export_dir: Option<PathBuf>,
}

impl PipelineResult {
    pub fn summary(&self) -> PipelineSummary<'_> {
        PipelineSummary {
            filename: &self.filename,
            width: self.original.width(),
            height: self.original.height(),
            edge_method: self.edge_parameters.method(),
            edge_parameters: self.edge_parameters,
            detections: &self.detections,
            counts: &self.counts,
            elapsed_seconds: self.elapsed_seconds,
            export_dir: self.export_dir.as_deref(),
        }
    }
}

/// Serializable view of a [`PipelineResult`] without pixel data.
#[derive(Debug, Serialize)]
pub struct PipelineSummary<'a> {
    pub filename: &'a str,
    pub width: u32,
    pub height: u32,
    pub edge_method: EdgeMethod,
    pub edge_parameters: EdgeParameters,
    pub detections: &'a [Detection],
    pub counts: &'a DetectionSummary,
    pub elapsed_seconds: f64,
    pub export_dir: Option<&'a Path>,
}
