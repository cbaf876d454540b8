//! Logging setup for pyramid builds.
//!
//! Builds log to `<dir>/<file>` and to stdout at the same time. The log file
//! is truncated when logging starts, so it only ever holds the latest build.
//! The level defaults to `info` and can be changed with `RUST_LOG`, e.g.
//! `RUST_LOG=tilepyramid=debug` to see per-partition writes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Keeps the background file writer alive. Dropping it flushes the log.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
    path: PathBuf,
}

impl LoggingGuard {
    /// Path of the active log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Installs the global subscriber with a file layer and a stdout layer.
///
/// Fails if the log file cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(
    log_dir: impl AsRef<Path>,
    log_file: &str,
) -> Result<LoggingGuard, io::Error> {
    let log_dir = log_dir.as_ref();
    let path = prepare_log_file(log_dir, log_file)?;

    let appender = tracing_appender::rolling::never(log_dir, log_file);
    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_target(false)
        .compact();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
        path,
    })
}

/// Creates the log directory and truncates the log file.
fn prepare_log_file(log_dir: &Path, log_file: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(log_dir)?;
    let path = log_dir.join(log_file);
    fs::write(&path, "")?;
    Ok(path)
}

pub fn default_log_dir() -> &'static str {
    "logs"
}

pub fn default_log_file() -> &'static str {
    "tilepyramid.log"
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_paths() {
        assert_eq!(default_log_dir(), "logs");
        assert_eq!(default_log_file(), "tilepyramid.log");
    }

    #[test]
    fn test_prepare_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a").join("b");

        let path = prepare_log_file(&dir, "build.log").unwrap();
        assert_eq!(path, dir.join("build.log"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_truncates_previous_log() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("build.log");
        fs::write(&path, "previous build").unwrap();

        prepare_log_file(temp.path(), "build.log").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_prepare_fails_when_directory_is_a_file() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("logs");
        fs::write(&blocker, "not a directory").unwrap();

        assert!(prepare_log_file(&blocker, "build.log").is_err());
    }
}
