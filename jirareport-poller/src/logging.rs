use std::{fmt, io, path::Path};

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use jirareport_config::LogConfig;
use jirareport_domain::TIMESTAMP_FORMAT;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Keeps the file writer flushing until dropped.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Writes `[YYYY-MM-DD HH:MM:SS]` in local time.
struct BracketedLocalTime;

impl FormatTime for BracketedLocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", bracketed_timestamp(&Local::now()))
    }
}

fn bracketed_timestamp<Tz>(now: &chrono::DateTime<Tz>) -> String
where
    Tz: chrono::TimeZone,
    Tz::Offset: fmt::Display,
{
    format!("[{}]", now.format(TIMESTAMP_FORMAT))
}

/// Installs the global subscriber: every line goes to stdout and, when
/// configured, is appended to the log file as well. `RUST_LOG` overrides the
/// configured level.
pub fn init(config: &LogConfig) -> Result<LogGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("invalid log level '{}'", config.level))?,
    };

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_timer(BracketedLocalTime)
        .with_level(false)
        .with_target(false)
        .with_ansi(false)
        .with_writer(io::stdout);

    let (file_layer, guard) = match config.file.as_deref() {
        Some(path) => {
            let appender = file_appender(path)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_timer(BracketedLocalTime)
                .with_level(false)
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .with_context(|| "failed to install log subscriber")?;

    Ok(LogGuard { _file: guard })
}

/// Appends to exactly `path`; the log is never rotated.
fn file_appender(path: &Path) -> Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("log file path '{}' has no file name", path.display()))?;
    let directory = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(directory)
        .with_context(|| format!("failed to open log file {}", path.display()))
}
