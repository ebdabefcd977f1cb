//! Logging utilities

use crate::Result;
use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
    Registry,
};

/// Initialize the tracing stack: a compact console layer plus a daily-rolling
/// log file. Engine targets follow the requested level; dependency noise
/// stays at `warn` unless `RUST_LOG` overrides the whole filter.
pub fn init<P: AsRef<Path>>(log_level: &str, log_file: P) -> Result<()> {
    let log_dir = log_file.as_ref().parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(log_dir)?;

    let file_name = log_file
        .as_ref()
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("arbitrage.log"));
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, file_name);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,multihop_arbitrage={level},arbitrage={level}",
            level = log_level
        ))
    });

    let console_layer = fmt::layer().compact().with_target(true);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .with_writer(file_appender);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
