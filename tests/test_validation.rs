mod common;

use common::*;
use visionedge::validate_image;

#[test]
fn test_accepts_supported_formats_within_limit() {
    let config = test_config();
    for name in ["photo.jpg", "photo.jpeg", "photo.png", "PHOTO.PNG", "scan.JpEg"] {
        let upload = UploadedImage::new(vec![0u8; 1024], name);
        let report = validate_image(Some(&upload), &config);
        assert!(report.valid, "{} should be accepted: {}", name, report.message);
        assert_eq!(report.message, "Valid image file");
    }
}

#[test]
fn test_exactly_at_limit_is_accepted() {
    let config = test_config();
    let upload = UploadedImage::new(vec![0u8; config.max_upload_size], "edge.png");
    assert!(validate_image(Some(&upload), &config).valid);
}

#[test]
fn test_rejects_oversized_png() {
    let config = test_config();
    let upload = UploadedImage::new(vec![0u8; 6 * 1024 * 1024], "huge.png");
    let report = validate_image(Some(&upload), &config);
    assert!(!report.valid);
    assert_eq!(report.message, "File size exceeds 5MB limit");
}

#[test]
fn test_rejects_bmp_with_format_list() {
    let config = test_config();
    let upload = UploadedImage::new(vec![0u8; 128], "diagram.bmp");
    let report = validate_image(Some(&upload), &config);
    assert!(!report.valid);
    assert_eq!(
        report.message,
        "Unsupported file format. Supported formats: jpg, jpeg, png"
    );
}

#[test]
fn test_rejects_missing_extension() {
    let config = test_config();
    let upload = UploadedImage::new(vec![0u8; 128], "png");
    assert!(!validate_image(Some(&upload), &config).valid);
}

#[test]
fn test_rejects_missing_file() {
    let report = validate_image(None, &test_config());
    assert!(!report.valid);
    assert_eq!(report.message, "No file uploaded");
}

#[test]
fn test_size_checked_before_format() {
    let config = test_config();
    let upload = UploadedImage::new(vec![0u8; 6 * 1024 * 1024], "huge.bmp");
    let report = validate_image(Some(&upload), &config);
    assert!(report.message.contains("limit"));
}

#[test]
fn test_oversized_file_on_disk_is_not_read() -> anyhow::Result<()> {
    let config = test_config();
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("huge.png");
    std::fs::write(&path, vec![0u8; 6 * 1024 * 1024])?;

    let upload = UploadedImage::from_path(&path, config.max_upload_size)?;
    assert!(upload.bytes.is_empty());
    assert_eq!(upload.len(), 6 * 1024 * 1024);
    assert_eq!(upload.filename, "huge.png");

    let report = validate_image(Some(&upload), &config);
    assert!(!report.valid);
    assert_eq!(report.message, "File size exceeds 5MB limit");
    Ok(())
}

#[test]
fn test_file_within_limit_is_read() -> anyhow::Result<()> {
    let config = test_config();
    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("scene.png");
    std::fs::write(&path, encode_png(&test_card(32, 32)))?;

    let upload = UploadedImage::from_path(&path, config.max_upload_size)?;
    assert_eq!(upload.len(), upload.bytes.len());
    assert!(!upload.is_empty());
    assert!(validate_image(Some(&upload), &config).valid);
    Ok(())
}
