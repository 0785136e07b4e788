use crate::detection::annotate::Annotator;
use crate::detection::model::{DetectionBackend, RawDetection};
use crate::error::{Result, VisionError};
use crate::models::{BoundingBox, ClassFilter, Detection, DetectionSummary};
use image::RgbImage;
use std::time::Instant;
use tracing::{debug, error};

/// Annotated copy of the input plus what was found on it.
#[derive(Debug, Clone)]
pub struct ObjectDetection {
    pub annotated: RgbImage,
    pub detections: Vec<Detection>,
    pub counts: DetectionSummary,
    pub elapsed_seconds: f64,
}

/// Run the detector once over `image`, keep the classes `filter` allows,
/// and draw the survivors on a copy of the image.
pub fn detect_objects(
    backend: &dyn DetectionBackend,
    image: &RgbImage,
    filter: &ClassFilter,
    annotator: &Annotator,
) -> Result<ObjectDetection> {
    let start = Instant::now();

    let raw = backend.infer(image).map_err(|e| {
        error!(operation = "detect_objects", "Object detection failed: {}", e.message());
        VisionError::Processing(format!("Object detection failed: {}", e.message()))
    })?;

    let mut annotated = image.clone();
    let mut detections = Vec::new();
    let mut counts = DetectionSummary::default();

    for candidate in raw {
        let class_name = resolve_class(backend.class_names(), candidate.class_id)?;
        if !filter.allows(class_name) {
            continue;
        }

        let Some(bbox) = to_pixel_box(&candidate, image.width(), image.height()) else {
            debug!(class_name, bbox = ?candidate.bbox, "Dropping degenerate box");
            continue;
        };

        let detection = Detection {
            class_name: class_name.to_string(),
            confidence: candidate.confidence.clamp(0.0, 1.0),
            bbox,
        };
        annotator.draw(&mut annotated, &detection);
        counts.record(class_name);
        detections.push(detection);
    }

    Ok(ObjectDetection {
        annotated,
        detections,
        counts,
        elapsed_seconds: start.elapsed().as_secs_f64(),
    })
}

fn resolve_class(class_names: &[String], class_id: usize) -> Result<&str> {
    class_names.get(class_id).map(String::as_str).ok_or_else(|| {
        error!(operation = "detect_objects", class_id, "Class id missing from label table");
        VisionError::Processing(format!(
            "Object detection failed: class id {} not in label table of {} classes",
            class_id,
            class_names.len()
        ))
    })
}

/// Truncate to integer pixels inside the image; `None` if nothing is left.
fn to_pixel_box(raw: &RawDetection, width: u32, height: u32) -> Option<BoundingBox> {
    if width == 0 || height == 0 || raw.bbox.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let clamp = |v: f32, max: u32| (v.max(0.0) as u32).min(max - 1);
    BoundingBox::new(
        clamp(raw.bbox[0], width),
        clamp(raw.bbox[1], height),
        clamp(raw.bbox[2], width),
        clamp(raw.bbox[3], height),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bbox: [f32; 4]) -> RawDetection {
        RawDetection {
            class_id: 0,
            confidence: 0.5,
            bbox,
        }
    }

    #[test]
    fn test_pixel_box_clamps_to_image() {
        let bbox = to_pixel_box(&raw([-5.0, 3.7, 250.0, 40.2]), 100, 50).unwrap();
        assert_eq!(bbox, BoundingBox::new(0, 3, 99, 40).unwrap());
    }

    #[test]
    fn test_pixel_box_drops_collapsed() {
        assert!(to_pixel_box(&raw([10.2, 10.0, 10.8, 20.0]), 100, 100).is_none());
        assert!(to_pixel_box(&raw([120.0, 0.0, 130.0, 20.0]), 100, 100).is_none());
        assert!(to_pixel_box(&raw([f32::NAN, 0.0, 10.0, 20.0]), 100, 100).is_none());
    }
}
