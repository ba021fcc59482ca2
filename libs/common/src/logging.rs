//! Unified logging module for the heater predictive-control host
//!
//! Console output goes to stderr and an optional daily rolling file goes to
//! `log_dir`. Both sinks write through `tracing-appender`'s non-blocking
//! worker, so a `tracing` call never waits on I/O from the control thread.

use std::fs;
use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::Writer,
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::error::{Error, Result};

/// Custom format for log level with brackets: `[INFO]`, `[WARN]`, etc.
fn format_level(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Custom event formatter that outputs: `timestamp [LEVEL] message`
///
/// Example output: `2025-12-02T00:50:44.809Z [INFO] heater_pc extruder: tick`
struct BracketedLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketedLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, format_level(&level))?;
        } else {
            write!(writer, "{} ", format_level(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Keeps the non-blocking log writers alive
///
/// Hold it for the life of the process; dropping it flushes whatever the
/// writers still buffer.
#[must_use = "dropping the guard stops the log writers"]
pub struct LogGuard {
    _guards: Vec<WorkerGuard>,
}

impl std::fmt::Debug for LogGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogGuard")
            .field("writers", &self._guards.len())
            .finish()
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the log file prefix
    pub service_name: String,
    /// Filter directive (e.g. "info" or "info,heater_pc=debug"); `RUST_LOG` wins
    pub level: String,
    /// Directory for the daily rolling file; `None` logs to the console only
    pub log_dir: Option<PathBuf>,
    /// JSON format for the file layer
    pub enable_json: bool,
    /// ANSI colors on the console layer
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "heatersrv".to_string(),
            level: "info".to_string(),
            log_dir: None,
            enable_json: false,
            ansi: true,
        }
    }
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    match std::env::var("RUST_LOG") {
        Ok(env_str) if !env_str.trim().is_empty() => EnvFilter::try_new(&env_str)
            .map_err(|e| Error::logging(format!("Invalid RUST_LOG '{}': {}", env_str, e))),
        _ => EnvFilter::try_new(level)
            .map_err(|e| Error::logging(format!("Invalid log level '{}': {}", level, e))),
    }
}

/// Initialize logging system with configuration
///
/// Fails if a global subscriber is already installed.
pub fn init_with_config(config: &LogConfig) -> Result<LogGuard> {
    let filter = build_filter(&config.level)?;
    let mut guards = Vec::with_capacity(2);

    let (console_writer, console_guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(console_guard);

    let console_layer = fmt::layer()
        .with_writer(console_writer)
        .with_ansi(config.ansi)
        .event_format(BracketedLevelFormat)
        .boxed();

    let file_layer = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let appender =
                tracing_appender::rolling::daily(dir, format!("{}.log", config.service_name));
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            guards.push(file_guard);

            let layer = if config.enable_json {
                fmt::layer()
                    .json()
                    .with_writer(file_writer)
                    .with_level(true)
                    .with_target(true)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(file_writer)
                    .with_ansi(false)
                    .event_format(BracketedLevelFormat)
                    .boxed()
            };
            Some(layer)
        },
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::logging(format!("Failed to install subscriber: {}", e)))?;

    match &config.log_dir {
        Some(dir) => tracing::info!("Logging: {} @ {:?}", config.service_name, dir),
        None => tracing::debug!("Logging: {} (console only)", config.service_name),
    }

    Ok(LogGuard { _guards: guards })
}

/// Console-only init with a level directive
pub fn init(level: &str) -> Result<LogGuard> {
    let config = LogConfig {
        level: level.to_string(),
        ..Default::default()
    };
    init_with_config(&config)
}
