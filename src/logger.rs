use std::fmt;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use error_stack::{IntoReport, ResultExt};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, Layer};

#[derive(Debug)]
pub struct LoggerError;
impl fmt::Display for LoggerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Logger error")
    }
}
impl std::error::Error for LoggerError {}

pub type LoggerResult<T> = error_stack::Result<T, LoggerError>;

/// Installs the global subscriber. The log file gets this crate's events from
/// debug up and is truncated on every run. Stderr shows info and up unless
/// `RUST_LOG` says otherwise.
pub fn init(log_file: &Path) -> LoggerResult<()> {
    let file = File::create(log_file)
        .into_report()
        .change_context(LoggerError)
        .attach_printable_lazy(|| format!("Cannot create log file {}", log_file.display()))?;

    let file_layer = tracing_fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(EnvFilter::new("info,playlist_sync=debug"));
    let stderr_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .into_report()
        .change_context(LoggerError)
}
