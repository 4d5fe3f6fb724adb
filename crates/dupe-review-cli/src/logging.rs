use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/dupe-review.log";

/// Resolved logging options. Console logs go to stderr; stdout carries
/// command output such as candidate tables and `--json` snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env(verbose: u8) -> Self {
        Self {
            filter: resolve_filter(verbose, env::var("TRACING_LEVEL").ok()),
            file: resolve_log_file(env::var("LOG_FILE_PATH").ok()),
        }
    }
}

/// `-v` and `-vv` override `TRACING_LEVEL`.
fn resolve_filter(verbose: u8, configured: Option<String>) -> String {
    match verbose {
        0 => configured.unwrap_or_else(|| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// An empty value or `-` turns file logging off.
fn resolve_log_file(configured: Option<String>) -> Option<PathBuf> {
    match configured {
        Some(path) if path.is_empty() || path == "-" => None,
        Some(path) => Some(PathBuf::from(path)),
        None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
    }
}

pub fn init_logger(settings: &LogSettings) -> Option<WorkerGuard> {
    let console = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_ansi(true);

    let (file_layer, guard) = match &settings.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .unwrap_or_else(|| OsStr::new("dupe-review.log"));
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .with(EnvFilter::new(&settings.filter))
        .init();

    debug!(
        "Logging at '{}', file log {:?}",
        settings.filter, settings.file
    );

    guard
}
