//! Logging setup and configuration

use anyhow::Result;
use std::fs;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use crate::config::{Config, LogFormat};

pub const LOG_FILE_PREFIX: &str = "wiggle-service.log";

pub struct LoggingGuard {
    pub _guard: tracing_appender::non_blocking::WorkerGuard,
}

/// Console output plus an hourly rolling file under `<output_dir>/logs`.
/// `RUST_LOG` directives take precedence over the configured level.
pub fn setup_logging(config: &Config) -> Result<Arc<LoggingGuard>> {
    let file_appender = tracing_appender::rolling::hourly(config.output_dir.join("logs"), LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let (json_file_layer, text_file_layer) = match config.log_format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_current_span(false),
            ),
            None,
        ),
        LogFormat::Text => (
            None,
            Some(
                fmt::layer()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_level(true)
                    .with_ansi(false)
                    .compact(),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_ansi(!config.is_production())
                .with_level(true),
        )
        .with(json_file_layer)
        .with(text_file_layer)
        .with(EnvFilter::from_default_env().add_directive(config.log_level.parse()?))
        .init();

    Ok(Arc::new(LoggingGuard { _guard: guard }))
}

pub fn setup_output_directories(config: &Config) -> Result<()> {
    fs::create_dir_all(config.output_dir.join("logs"))?;
    fs::create_dir_all(config.output_dir.join(crate::storage::OPPORTUNITIES_DIR))?;
    fs::create_dir_all(config.output_dir.join(crate::analytics::REPORTS_DIR))?;

    Ok(())
}
