//! Pretrained object detector behind the [`DetectionBackend`] seam.
//!
//! [`DetectionModel`] runs a YOLOv8-style network exported to `.rten`:
//! input `[1, 3, 640, 640]` RGB scaled to `[0, 1]` and letterboxed on
//! grey so the aspect ratio survives, output
//! `[1, 4 + classes, anchors]` with centre/size boxes in input pixels
//! followed by one score per class.

use crate::config::AppConfig;
use crate::error::{Result, VisionError};
use image::RgbImage;
use image::imageops::FilterType;
use rten::Model;
use rten_tensor::prelude::*;
use rten_tensor::NdTensor;
use std::path::Path;
use tracing::{error, info};

/// COCO class names (80 classes)
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat",
    "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack",
    "umbrella", "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball",
    "kite", "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana", "apple",
    "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair",
    "couch", "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink", "refrigerator",
    "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

const INPUT_SIZE: u32 = 640;
const PAD_VALUE: f32 = 114.0 / 255.0;

/// Aspect-preserving fit of an image into the square network input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    pub fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width.max(1) as f32).min(target as f32 / height.max(1) as f32);
        let (new_w, new_h) = Self::scaled(width, height, scale, target);
        Self {
            scale,
            pad_x: (target - new_w) / 2,
            pad_y: (target - new_h) / 2,
        }
    }

    fn scaled(width: u32, height: u32, scale: f32, target: u32) -> (u32, u32) {
        (
            ((width as f32 * scale).round() as u32).clamp(1, target),
            ((height as f32 * scale).round() as u32).clamp(1, target),
        )
    }

    /// Map a point in network input pixels back to the source image.
    pub fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale,
            (y - self.pad_y as f32) / self.scale,
        )
    }
}

/// One box as produced by the model, in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]`
    pub bbox: [f32; 4],
}

/// Anything that can turn an RGB image into raw detections.
///
/// Implementations are loaded once and shared read-only between requests.
pub trait DetectionBackend: Send + Sync {
    /// Label table indexed by class id
    fn class_names(&self) -> &[String];

    /// Single inference pass over `image`.
    fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>>;
}

pub struct DetectionModel {
    model: Model,
    class_names: Vec<String>,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl DetectionModel {
    /// Load the network and its label table from the configured paths.
    pub fn load(config: &AppConfig) -> Result<Self> {
        if !config.model_path.exists() {
            error!(operation = "load_model", path = %config.model_path.display(), "Model file missing");
            return Err(VisionError::Configuration(format!(
                "Detection model not found at {}",
                config.model_path.display()
            )));
        }

        let class_names = match &config.labels_path {
            Some(path) => load_labels(path)?,
            None => COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
        };

        let model = Model::load_file(&config.model_path).map_err(|e| {
            error!(operation = "load_model", path = %config.model_path.display(), "Failed to load model: {}", e);
            VisionError::Configuration(format!(
                "Failed to load detection model {}: {}",
                config.model_path.display(),
                e
            ))
        })?;

        info!(
            path = %config.model_path.display(),
            classes = class_names.len(),
            "Detection model loaded"
        );

        Ok(Self {
            model,
            class_names,
            confidence_threshold: config.confidence_threshold,
            iou_threshold: config.iou_threshold,
        })
    }

    fn preprocess(&self, image: &RgbImage) -> (NdTensor<f32, 4>, Letterbox) {
        let letterbox = Letterbox::fit(image.width(), image.height(), INPUT_SIZE);
        let (new_w, new_h) = Letterbox::scaled(image.width(), image.height(), letterbox.scale, INPUT_SIZE);
        let resized = image::imageops::resize(image, new_w, new_h, FilterType::Triangle);

        let side = INPUT_SIZE as usize;
        let plane = side * side;
        let mut data = vec![PAD_VALUE; 3 * plane];

        for (x, y, pixel) in resized.enumerate_pixels() {
            let i = (y + letterbox.pad_y) as usize * side + (x + letterbox.pad_x) as usize;
            for c in 0..3 {
                data[c * plane + i] = pixel[c] as f32 / 255.0;
            }
        }

        (NdTensor::from_data([1, 3, side, side], data), letterbox)
    }
}

impl DetectionBackend for DetectionModel {
    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn infer(&self, image: &RgbImage) -> Result<Vec<RawDetection>> {
        let (input, letterbox) = self.preprocess(image);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| VisionError::Processing(format!("Inference failed: {}", e)))?;
        let output: NdTensor<f32, 3> = output
            .try_into()
            .map_err(|e| VisionError::Processing(format!("Unexpected model output: {:?}", e)))?;

        let [_batch, rows, anchors] = output.shape();
        let data: Vec<f32> = output.iter().copied().collect();
        let candidates = decode_yolo_output(&data, rows, anchors, &letterbox, self.confidence_threshold)?;
        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Read a label table: one class name per line, blank lines skipped.
pub fn load_labels(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        VisionError::Configuration(format!("Failed to read labels {}: {}", path.display(), e))
    })?;
    let labels = parse_labels(&text);
    if labels.is_empty() {
        return Err(VisionError::Configuration(format!(
            "Label file {} is empty",
            path.display()
        )));
    }
    Ok(labels)
}

pub fn parse_labels(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Decode the first batch entry of a `[4 + classes, anchors]` output laid
/// out row-major in `data`. Boxes are mapped back through `letterbox`.
pub fn decode_yolo_output(
    data: &[f32],
    rows: usize,
    anchors: usize,
    letterbox: &Letterbox,
    confidence_threshold: f32,
) -> Result<Vec<RawDetection>> {
    if rows <= 4 || data.len() < rows * anchors {
        return Err(VisionError::Processing(format!(
            "Unexpected model output shape: {} rows x {} anchors ({} values)",
            rows,
            anchors,
            data.len()
        )));
    }

    let at = |row: usize, anchor: usize| data[row * anchors + anchor];
    let mut detections = Vec::new();

    for a in 0..anchors {
        let (class_id, confidence) = (4..rows)
            .map(|r| (r - 4, at(r, a)))
            .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });

        if confidence < confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (at(0, a), at(1, a), at(2, a), at(3, a));
        let (x1, y1) = letterbox.to_image(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = letterbox.to_image(cx + w / 2.0, cy + h / 2.0);
        detections.push(RawDetection {
            class_id,
            confidence,
            bbox: [x1, y1, x2, y2],
        });
    }

    Ok(detections)
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let iy = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = ix * iy;
    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

/// Per-class greedy NMS; survivors come back sorted by confidence.
pub fn non_max_suppression(mut candidates: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<RawDetection> = Vec::new();
    for candidate in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(class_id: usize, confidence: f32, bbox: [f32; 4]) -> RawDetection {
        RawDetection {
            class_id,
            confidence,
            bbox,
        }
    }

    #[test]
    fn test_parse_labels_skips_blank_lines() {
        assert_eq!(parse_labels("cat\n\n  dog \n"), vec!["cat", "dog"]);
    }

    #[test]
    fn test_load_missing_model_is_configuration_error() {
        let config = AppConfig {
            model_path: "/nonexistent/model.rten".into(),
            ..AppConfig::default()
        };
        match DetectionModel::load(&config) {
            Err(VisionError::Configuration(msg)) => assert!(msg.contains("not found")),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("model should not load"),
        }
    }

    #[test]
    fn test_nms_suppresses_overlap_within_class() {
        let kept = non_max_suppression(
            vec![
                raw(0, 0.6, [0.0, 0.0, 10.0, 10.0]),
                raw(0, 0.9, [1.0, 1.0, 11.0, 11.0]),
                raw(1, 0.5, [1.0, 1.0, 11.0, 11.0]),
                raw(0, 0.4, [50.0, 50.0, 60.0, 60.0]),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].confidence, 0.9);
        assert!(kept.iter().any(|d| d.class_id == 1));
    }

    #[test]
    fn test_decode_picks_best_class_and_undoes_letterbox() {
        // 2 classes, 2 anchors: rows = cx, cy, w, h, score0, score1
        let data = vec![
            100.0, 300.0, // cx
            100.0, 300.0, // cy
            20.0, 40.0, // w
            40.0, 40.0, // h
            0.1, 0.05, // class 0
            0.8, 0.1, // class 1
        ];
        let letterbox = Letterbox {
            scale: 0.5,
            pad_x: 10,
            pad_y: 20,
        };
        let out = decode_yolo_output(&data, 6, 2, &letterbox, 0.25).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].class_id, 1);
        assert_eq!(out[0].bbox, [160.0, 120.0, 200.0, 200.0]);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        let identity = Letterbox::fit(INPUT_SIZE, INPUT_SIZE, INPUT_SIZE);
        assert!(decode_yolo_output(&[0.0; 4], 4, 1, &identity, 0.25).is_err());
    }

    #[test]
    fn test_letterbox_keeps_aspect_ratio() {
        let wide = Letterbox::fit(1280, 640, INPUT_SIZE);
        assert_eq!(wide, Letterbox { scale: 0.5, pad_x: 0, pad_y: 160 });

        let tall = Letterbox::fit(320, 640, INPUT_SIZE);
        assert_eq!(tall, Letterbox { scale: 1.0, pad_x: 160, pad_y: 0 });

        // The padded band maps back to the image edges.
        assert_eq!(wide.to_image(0.0, 160.0), (0.0, 0.0));
        assert_eq!(wide.to_image(640.0, 480.0), (1280.0, 640.0));
    }
}
