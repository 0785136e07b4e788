use crate::models::Detection;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::Path;
use tracing::warn;

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: u32 = 2;
const LABEL_OFFSET: i32 = 10;
const LABEL_SCALE: f32 = 16.0;

/// Draws detection boxes and their `"{class} {confidence}"` labels.
pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(LABEL_SCALE),
        }
    }

    /// Boxes only.
    pub fn without_labels() -> Self {
        Self::new(None)
    }

    /// Load the label font from `path`; fall back to boxes only if that fails.
    pub fn from_font_path(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            warn!("No label font configured, drawing boxes without labels");
            return Self::without_labels();
        };

        let font = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontVec::try_from_vec(bytes).map_err(|e| e.to_string()));

        match font {
            Ok(font) => Self::new(Some(font)),
            Err(e) => {
                warn!(path = %path.display(), "Label font unavailable ({}), drawing boxes without labels", e);
                Self::without_labels()
            }
        }
    }

    pub fn draws_labels(&self) -> bool {
        self.font.is_some()
    }

    pub fn draw(&self, canvas: &mut RgbImage, detection: &Detection) {
        let bbox = detection.bbox;

        for inset in 0..BOX_THICKNESS {
            let width = (bbox.width() + 1).saturating_sub(2 * inset);
            let height = (bbox.height() + 1).saturating_sub(2 * inset);
            if width == 0 || height == 0 {
                break;
            }
            let rect = Rect::at((bbox.x1 + inset) as i32, (bbox.y1 + inset) as i32)
                .of_size(width, height);
            draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
        }

        if let Some(font) = &self.font {
            let label = detection.label();
            let (_, text_height) = text_size(self.scale, font, &label);
            // Baseline sits LABEL_OFFSET above the box, pinned inside the image.
            let y = (bbox.y1 as i32 - LABEL_OFFSET - text_height as i32).max(0);
            draw_text_mut(canvas, BOX_COLOR, bbox.x1 as i32, y, self.scale, font, &label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BoundingBox;

    #[test]
    fn test_draws_box_outline_only() {
        let mut canvas = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        let detection = Detection {
            class_name: "cat".to_string(),
            confidence: 0.9,
            bbox: BoundingBox::new(2, 2, 12, 12).unwrap(),
        };
        Annotator::without_labels().draw(&mut canvas, &detection);

        assert_eq!(*canvas.get_pixel(2, 2), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(3, 3), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(12, 7), BOX_COLOR);
        assert_eq!(*canvas.get_pixel(7, 7), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(15, 15), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_missing_font_falls_back() {
        let annotator = Annotator::from_font_path(Some(Path::new("/nonexistent/font.ttf")));
        assert!(!annotator.draws_labels());
    }
}
