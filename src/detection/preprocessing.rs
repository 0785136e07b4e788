use crate::error::{Result, VisionError};
use crate::models::UploadedImage;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};
use tracing::{debug, error};

/// Decode an upload into an RGB image, whatever its stored pixel format.
pub fn decode_upload(upload: &UploadedImage) -> Result<RgbImage> {
    let img = image::load_from_memory(&upload.bytes).map_err(|e| {
        error!(operation = "decode_upload", filename = %upload.filename, "Failed to decode image: {}", e);
        VisionError::Processing(format!("Failed to decode image: {}", e))
    })?;
    Ok(img.to_rgb8())
}

/// Shrink `img` so that its longest side is at most `max_dimension`.
pub fn limit_dimension(img: RgbImage, max_dimension: u32) -> RgbImage {
    let (width, height) = img.dimensions();
    let longest = width.max(height);
    if longest <= max_dimension {
        return img;
    }

    let scale = max_dimension as f64 / longest as f64;
    let new_width = ((width as f64 * scale).round() as u32).max(1);
    let new_height = ((height as f64 * scale).round() as u32).max(1);
    debug!(width, height, new_width, new_height, "Downscaling image");
    image::imageops::resize(&img, new_width, new_height, FilterType::Triangle)
}

/// Convert image to grayscale
pub fn to_grayscale(img: &RgbImage) -> GrayImage {
    DynamicImage::ImageRgb8(img.clone()).to_luma8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_limit_dimension_keeps_small_images() {
        let img = RgbImage::from_pixel(40, 20, Rgb([1, 2, 3]));
        let out = limit_dimension(img, 800);
        assert_eq!(out.dimensions(), (40, 20));
    }

    #[test]
    fn test_limit_dimension_preserves_aspect() {
        let img = RgbImage::from_pixel(1600, 400, Rgb([1, 2, 3]));
        let out = limit_dimension(img, 800);
        assert_eq!(out.dimensions(), (800, 200));
    }

    #[test]
    fn test_grayscale_keeps_dimensions() {
        let img = RgbImage::from_pixel(7, 5, Rgb([200, 200, 200]));
        let gray = to_grayscale(&img);
        assert_eq!(gray.dimensions(), (7, 5));
        assert!(gray.pixels().all(|p| p[0] == 200));
    }
}
