use crate::config::AppConfig;
use crate::models::UploadedImage;

/// Outcome of checking an upload: a flag plus a message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub message: String,
}

impl ValidationReport {
    fn accept(message: impl Into<String>) -> Self {
        Self {
            valid: true,
            message: message.into(),
        }
    }

    fn reject(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Check an upload against the size limit and the supported formats.
///
/// Pure function of the bytes length and the file name; the pixels are
/// never decoded here.
pub fn validate_image(upload: Option<&UploadedImage>, config: &AppConfig) -> ValidationReport {
    let Some(upload) = upload else {
        return ValidationReport::reject("No file uploaded");
    };

    if upload.len() > config.max_upload_size {
        return ValidationReport::reject(format!(
            "File size exceeds {}MB limit",
            format_megabytes(config.max_upload_size)
        ));
    }

    let supported = upload
        .extension()
        .is_some_and(|ext| config.supported_formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)));
    if !supported {
        return ValidationReport::reject(format!(
            "Unsupported file format. Supported formats: {}",
            config.supported_formats.join(", ")
        ));
    }

    ValidationReport::accept("Valid image file")
}

fn format_megabytes(bytes: usize) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb.fract() == 0.0 {
        format!("{}", mb as u64)
    } else {
        format!("{:.1}", mb)
    }
}
