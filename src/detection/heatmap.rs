use crate::error::{Result, VisionError};
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use tracing::error;

/// Jet colour for an intensity: dark blue at 0, through cyan and yellow,
/// to dark red at 255.
pub fn jet(value: u8) -> Rgb<u8> {
    let x = value as f32 / 255.0;
    let channel = |offset: f32| ((1.5 - (4.0 * x - offset).abs()).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}

/// Colour every pixel of an edge map through the jet lookup table.
pub fn apply_colormap(edges: &GrayImage) -> RgbImage {
    let lut: Vec<Rgb<u8>> = (0..=255u8).map(jet).collect();
    RgbImage::from_fn(edges.width(), edges.height(), |x, y| {
        lut[edges.get_pixel(x, y)[0] as usize]
    })
}

/// Like [`apply_colormap`] for untyped images; anything other than a
/// single 8-bit channel is rejected.
pub fn render_heatmap(edges: &DynamicImage) -> Result<RgbImage> {
    match edges {
        DynamicImage::ImageLuma8(gray) => Ok(apply_colormap(gray)),
        other => {
            let color = other.color();
            error!(operation = "render_heatmap", ?color, "Heatmap generation failed");
            Err(VisionError::Processing(format!(
                "Heatmap generation failed: expected a single-channel 8-bit image, got {:?}",
                color
            )))
        }
    }
}
