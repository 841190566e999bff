//! Structured logging and tracing for the Powershop collector
//!
//! One global subscriber is installed per process: a daily rotated file
//! writer plus optional console output, each with its own level, in plain
//! or JSON format. Components log through [`StructuredLogger`] so every event
//! carries its component and, when scoped, the property it concerns.

use crate::config::LoggingConfig;
use crate::error::{PowershopError, Result};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod level;
mod structured;

pub use level::{min_level, parse_log_level};
pub use structured::{LogContext, StructuredLogger, get_logger, get_logger_with_context};

pub const DISABLE_FILE_LOG_ENV: &str = "POWERSHOP_DISABLE_FILE_LOG";
const LOG_FILE_PREFIX: &str = "powershop";

// Flushes the file writer on exit; must outlive the subscriber
static LOG_GUARD: OnceCell<WorkerGuard> = OnceCell::new();
static INIT_RESULT: OnceCell<std::result::Result<(), String>> = OnceCell::new();

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Install the global subscriber; later calls return the first outcome
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    INIT_RESULT
        .get_or_init(|| install(config).map_err(|e| e.to_string()))
        .clone()
        .map_err(PowershopError::config)
}

/// Console and file levels, each falling back to the base level
fn resolve_levels(config: &LoggingConfig) -> Result<(Level, Level)> {
    let base = parse_log_level(&config.level)?;
    let pick = |specific: &Option<String>| {
        specific
            .as_deref()
            .and_then(|s| parse_log_level(s).ok())
            .unwrap_or(base)
    };
    Ok((pick(&config.console_level), pick(&config.file_level)))
}

fn install(config: &LoggingConfig) -> Result<()> {
    let (console_level, file_level) = resolve_levels(config)?;
    let filter = env_filter(min_level(console_level, file_level));

    if console_only() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer(std::io::stdout, config.json_format, true, console_level))
            .init();
        info!("Logging initialized - console_level: {:?}, console-only", console_level);
        return Ok(());
    }

    let writer = file_writer(config)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer(writer, config.json_format, false, file_level))
        .with(
            config
                .console_output
                .then(|| fmt_layer(std::io::stdout, config.json_format, true, console_level)),
        )
        .init();

    info!(
        "Logging initialized - console_level: {:?}, file_level: {:?}, dir: {}",
        console_level,
        file_level,
        log_directory(&config.file).display()
    );
    Ok(())
}

fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "powershop_nz={},reqwest=warn,hyper=warn,html5ever=warn",
            level
        )
        .into()
    })
}

fn console_only() -> bool {
    cfg!(test) || std::env::var_os(DISABLE_FILE_LOG_ENV).is_some()
}

/// Directory for rotated files: the parent of a file path, or the path itself
fn log_directory(file: &str) -> PathBuf {
    let path = Path::new(file);
    match path.parent() {
        Some(parent) if path.extension().is_some() => parent.to_path_buf(),
        _ => path.to_path_buf(),
    }
}

fn file_writer(config: &LoggingConfig) -> Result<NonBlocking> {
    let appender = rolling::Builder::new()
        .rotation(rolling::Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.backup_count.max(1) as usize)
        .build(log_directory(&config.file))
        .map_err(|e| PowershopError::io(format!("Failed to create log file appender: {}", e)))?;

    let (writer, guard) = tracing_appender::non_blocking(appender);
    let _ = LOG_GUARD.set(guard);
    Ok(writer)
}

fn fmt_layer<S, W>(writer: W, json: bool, ansi: bool, level: Level) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false);
    let filter = LevelFilter::from_level(level);
    if json {
        layer.json().with_filter(filter).boxed()
    } else {
        layer.with_filter(filter).boxed()
    }
}
