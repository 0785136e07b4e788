//! Subscriber set-up and scoped stage timing.

use crate::error::{Result, VisionError};
use crate::pipeline::PipelineContext;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` wins over `level`.
///
/// Call once at start-up; a second call reports a configuration error.
pub fn init(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).map_err(|e| {
            VisionError::Configuration(format!("Invalid log level {:?}: {}", level, e))
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| VisionError::Configuration(format!("Logging already initialized: {}", e)))
}

/// Run `f` inside the request span and log how long it took.
pub fn timed<T, F>(context: &PipelineContext, operation: &'static str, f: F) -> Result<(T, Duration)>
where
    F: FnOnce() -> Result<T>,
{
    let _entered = context.span.enter();
    let start = Instant::now();
    let outcome = f();
    let elapsed = start.elapsed();

    match &outcome {
        Ok(_) => info!(
            operation,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            "{} executed in {:.2} seconds",
            operation,
            elapsed.as_secs_f64()
        ),
        Err(e) => warn!(
            operation,
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            error = %e.message(),
            "{} aborted",
            operation
        ),
    }

    outcome.map(|value| (value, elapsed))
}
