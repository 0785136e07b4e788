use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use visionedge::detection::Annotator;
use visionedge::{AppConfig, DetectionBackend, Pipeline, RawDetection, VisionError};

/// Uniform grayscale image.
pub fn uniform_gray(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

/// Black left half, white right half: one strong vertical edge.
pub fn step_gray(width: u32, height: u32) -> GrayImage {
    ImageBuffer::from_fn(width, height, |x, _| {
        if x < width / 2 { Luma([0u8]) } else { Luma([255u8]) }
    })
}

/// Gradient test card with a bright square in the middle.
pub fn test_card(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        let inside = x > width / 4 && x < 3 * width / 4 && y > height / 4 && y < 3 * height / 4;
        if inside {
            Rgb([240u8, 240, 240])
        } else {
            Rgb([(x % 256) as u8, (y % 256) as u8, 64])
        }
    })
}

/// Encodes an RGB image as PNG bytes.
pub fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes
}

/// A PNG upload of a test card.
pub fn png_upload(width: u32, height: u32, filename: &str) -> visionedge::UploadedImage {
    visionedge::UploadedImage::new(encode_png(&test_card(width, height)), filename)
}

/// Detector stand-in returning a fixed list of boxes, or failing on demand.
pub struct ScriptedBackend {
    pub labels: Vec<String>,
    pub detections: Vec<RawDetection>,
    pub fail: bool,
}

impl ScriptedBackend {
    pub fn new(labels: &[&str], detections: Vec<RawDetection>) -> Self {
        Self {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            detections,
            fail: false,
        }
    }

    pub fn failing(labels: &[&str]) -> Self {
        Self {
            fail: true,
            ..Self::new(labels, Vec::new())
        }
    }
}

impl DetectionBackend for ScriptedBackend {
    fn class_names(&self) -> &[String] {
        &self.labels
    }

    fn infer(&self, _image: &RgbImage) -> visionedge::Result<Vec<RawDetection>> {
        if self.fail {
            return Err(VisionError::Processing("backend exploded".to_string()));
        }
        Ok(self.detections.clone())
    }
}

pub fn raw(class_id: usize, confidence: f32, bbox: [f32; 4]) -> RawDetection {
    RawDetection {
        class_id,
        confidence,
        bbox,
    }
}

/// Labels used by the scripted backend in most tests
pub const TEST_LABELS: &[&str] = &["person", "bicycle", "car", "dog"];

/// Two people, a car and a dog.
pub fn street_scene() -> Vec<RawDetection> {
    vec![
        raw(0, 0.91, [10.0, 10.0, 40.0, 80.0]),
        raw(0, 0.62, [50.0, 12.0, 75.0, 85.0]),
        raw(2, 0.88, [5.0, 60.0, 95.0, 95.0]),
        raw(3, 0.45, [60.0, 70.0, 80.0, 90.0]),
    ]
}

/// Config without a font so tests never depend on system fonts.
pub fn test_config() -> AppConfig {
    AppConfig {
        font_path: None,
        ..AppConfig::default()
    }
}

/// Pipeline wired to a scripted backend.
pub fn scripted_pipeline(backend: ScriptedBackend) -> Pipeline {
    Pipeline::new(Arc::new(test_config()), Arc::new(backend))
        .with_annotator(Annotator::without_labels())
}
