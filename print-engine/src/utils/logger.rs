//! Logging Infrastructure
//!
//! Console logging always; when a log directory is configured:
//! - `app` - daily rotating application log
//! - `operator` - daily rotating log of events that need a human
//!   (jobs failed for good, printers throwing protocol errors)

use std::fs;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log target for operator-facing events
pub const OPERATOR_TARGET: &str = "operator";

/// Initialize console-only logging
pub fn init_logger(level: &str) -> anyhow::Result<()> {
    init_logger_with_file(level, None)
}

/// Initialize logging with optional daily rotating files
///
/// `RUST_LOG` overrides `level` when set.
pub fn init_logger_with_file(level: &str, log_dir: Option<&str>) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let Some(dir) = log_dir else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .try_init()?;
        return Ok(());
    };

    let log_dir = Path::new(dir);
    let app_dir = log_dir.join("app");
    let operator_dir = log_dir.join("operator");
    fs::create_dir_all(&app_dir)?;
    fs::create_dir_all(&operator_dir)?;

    let app_log = RollingFileAppender::new(Rotation::DAILY, app_dir, "app");
    let app_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_current_span(true)
        .with_writer(std::sync::Mutex::new(app_log));

    let operator_log = RollingFileAppender::new(Rotation::DAILY, operator_dir, "operator");
    let operator_layer = fmt::layer()
        .json()
        .with_target(true)
        .with_writer(std::sync::Mutex::new(operator_log))
        .with_filter(tracing_subscriber::filter::filter_fn(|meta| {
            meta.target() == OPERATOR_TARGET
        }));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(app_layer)
        .with(operator_layer)
        .try_init()?;

    Ok(())
}
