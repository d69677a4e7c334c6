//! Tracing setup for hosts embedding the engine. The library itself only
//! emits events; a binary opts into a subscriber through [`init`].

use std::io;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Filter directive string, e.g. `"info,mastery_analytics=debug"`.
    /// Invalid directives fall back to `"info"`.
    pub filter: String,
    /// When set, a daily-rotated `analytics.log` is written here in addition
    /// to stdout.
    pub file_dir: Option<PathBuf>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file_dir: None,
        }
    }
}

/// Keeps the background file writer alive; dropping it flushes pending lines.
pub struct LogGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Installs the global subscriber. Fails when one is already installed (the
/// existing subscriber stays in place) or the log directory cannot be created.
pub fn init(options: &LogOptions) -> io::Result<LogGuard> {
    let filter = EnvFilter::try_new(&options.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(true);

    let mut file_writer = None;
    let file_layer = match &options.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "analytics.log");
            let (writer, worker) = tracing_appender::non_blocking(appender);
            file_writer = Some(worker);
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| io::Error::new(io::ErrorKind::AlreadyExists, err))?;

    Ok(LogGuard {
        _file_writer: file_writer,
    })
}
