use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};

use visionedge::{
    AnalysisRequest, AppConfig, ClassFilter, DetectionModel, EdgeMethod, EdgeParameters, Pipeline,
    PipelineResult, UploadedImage, cache, logging,
};

#[derive(Parser)]
#[command(name = "visionedge")]
#[command(about = "Edge maps, heatmaps and object detection for a single image")]
struct Cli {
    /// Path to input image file
    #[arg(value_name = "IMAGE", required_unless_present = "list_classes")]
    image_path: Option<PathBuf>,

    /// Edge detection method
    #[arg(short, long, value_enum, default_value_t = EdgeMethod::Canny)]
    method: EdgeMethod,

    /// Canny lower threshold (0-500)
    #[arg(long, default_value_t = 100.0)]
    threshold1: f32,

    /// Canny upper threshold (0-500)
    #[arg(long, default_value_t = 200.0)]
    threshold2: f32,

    /// Sobel/Laplacian kernel size (odd, 3-15)
    #[arg(long, default_value_t = 3)]
    kernel_size: u32,

    /// Comma-separated classes to keep (default: the first few labels)
    #[arg(long, value_delimiter = ',', conflicts_with = "all_classes")]
    classes: Option<Vec<String>>,

    /// Keep every class the model knows
    #[arg(long)]
    all_classes: bool,

    /// Save the images, to DIR or to the cache directory
    #[arg(long, value_name = "DIR", num_args = 0..=1)]
    save: Option<Option<PathBuf>>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// List the model's class names and exit
    #[arg(long)]
    list_classes: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn edge_parameters(&self) -> EdgeParameters {
        match self.method {
            EdgeMethod::Canny => EdgeParameters::Canny {
                threshold1: self.threshold1,
                threshold2: self.threshold2,
            },
            EdgeMethod::Sobel => EdgeParameters::Sobel {
                kernel_size: self.kernel_size,
            },
            EdgeMethod::Laplacian => EdgeParameters::Laplacian {
                kernel_size: self.kernel_size,
            },
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let level = if args.verbose { "debug" } else { config.log_level.as_str() };
    logging::init(level)?;
    debug!(config = %serde_json::to_string(&config)?, "Effective configuration");

    if let Err(e) = cache::cleanup_expired(&config.cache_dir, config.cache_timeout()) {
        warn!("Cache cleanup failed: {}", e);
    }

    let model = match DetectionModel::load(&config) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    let config = Arc::new(config);
    let mut pipeline = Pipeline::new(config.clone(), Arc::new(model));

    if args.list_classes {
        for (id, name) in pipeline.class_names().iter().enumerate() {
            println!("{:>3}  {}", id, name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(save) = &args.save {
        let dir = save.clone().unwrap_or_else(|| config.cache_dir.clone());
        pipeline = pipeline.with_export(dir)?;
    }

    let classes = if args.all_classes {
        ClassFilter::All
    } else if let Some(names) = &args.classes {
        match pipeline.class_filter_for(names) {
            Ok(filter) => filter,
            Err(e) => {
                eprintln!("Error: {}", e.message());
                return Ok(ExitCode::FAILURE);
            }
        }
    } else {
        pipeline.default_class_filter()
    };

    let request = AnalysisRequest {
        edge: args.edge_parameters(),
        classes,
    };

    let upload = match &args.image_path {
        Some(path) => Some(UploadedImage::from_path(path, config.max_upload_size)?),
        None => None,
    };

    match pipeline.run(upload.as_ref(), &request) {
        Ok(result) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result.summary())?);
            } else {
                print_report(&result);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e.message());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn print_report(result: &PipelineResult) {
    println!(
        "=== {} ({}x{}) ===",
        result.filename,
        result.original.width(),
        result.original.height()
    );
    println!("Edge detection: {}", result.edge_parameters.method());
    println!("Detection time: {:.2}s", result.elapsed_seconds);

    if result.detections.is_empty() {
        println!("\nNo objects detected.");
    } else {
        println!("\nDetections:");
        println!("  {:<16} {:>10}  bbox", "class", "confidence");
        for d in &result.detections {
            println!(
                "  {:<16} {:>10.2}  ({}, {}) - ({}, {})",
                d.class_name, d.confidence, d.bbox.x1, d.bbox.y1, d.bbox.x2, d.bbox.y2
            );
        }

        println!("\nCounts:");
        for (class_name, count) in result.counts.iter() {
            println!("  {}: {}", class_name, count);
        }
    }

    if let Some(dir) = &result.export_dir {
        println!("\nImages saved to {}", dir.display());
    }
}
