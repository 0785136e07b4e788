mod common;

use common::*;
use image::{DynamicImage, RgbImage};
use visionedge::detection::heatmap::jet;
use visionedge::detection::{apply_colormap, detect_edges, render_heatmap};

#[test]
fn test_heatmap_has_three_channels_and_same_size() {
    let edges = detect_edges(&EdgeParameters::Sobel { kernel_size: 3 }, &step_gray(33, 17)).unwrap();
    let heatmap = render_heatmap(&DynamicImage::ImageLuma8(edges)).unwrap();
    assert_eq!(heatmap.dimensions(), (33, 17));
    assert_eq!(heatmap.as_raw().len(), 33 * 17 * 3);
}

#[test]
fn test_heatmap_is_deterministic() {
    let edges = detect_edges(&EdgeParameters::Laplacian { kernel_size: 3 }, &step_gray(25, 25)).unwrap();
    let first = apply_colormap(&edges);
    let second = apply_colormap(&edges);
    assert_eq!(first.as_raw(), second.as_raw());
}

#[test]
fn test_low_is_blue_high_is_red() {
    let heatmap = apply_colormap(&step_gray(2, 1));
    assert_eq!(*heatmap.get_pixel(0, 0), jet(0));
    assert_eq!(*heatmap.get_pixel(1, 0), jet(255));
    let low = heatmap.get_pixel(0, 0);
    let high = heatmap.get_pixel(1, 0);
    assert!(low[2] > low[0]);
    assert!(high[0] > high[2]);
}

#[test]
fn test_rejects_color_input() {
    let color = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
    match render_heatmap(&color) {
        Err(VisionError::Processing(msg)) => assert!(msg.contains("Heatmap generation failed")),
        other => panic!("expected processing error, got {:?}", other.map(|i| i.dimensions())),
    }
}
