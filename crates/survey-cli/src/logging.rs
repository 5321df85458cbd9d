//! Logging setup built on `tracing` and `tracing-subscriber`.
//!
//! Reconciliation warnings and loader progress surface here. A `RUST_LOG`
//! environment filter overrides the flag-derived level when present.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LevelFilter,
    pub with_ansi: bool,
    /// Append to this file instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            with_ansi: true,
            log_file: None,
        }
    }
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails when the log file cannot be opened.
///
/// # Panics
///
/// Panics when called more than once in a process.
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        install(config, LogFileWriter::new(file));
    } else {
        install(config, io::stderr);
    }
    Ok(())
}

fn install<W>(config: &LogConfig, writer: W)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(config.with_ansi)
        .with_target(false)
        .without_time();
    tracing_subscriber::registry()
        .with(env_filter(config.level))
        .with(layer)
        .init();
}

/// Workspace crates log at the configured level, everything else at warn.
fn env_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,survey_cli={level},survey_core={level},survey_ingest={level},\
             survey_model={level},survey_analysis={level}"
        ))
    })
}

/// Serialized writer shared by all subscriber layers when logging to a
/// file.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl LogFileWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

struct LogFileGuard {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.flush()
    }
}

impl<'a> MakeWriter<'a> for LogFileWriter {
    type Writer = LogFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        LogFileGuard {
            file: Arc::clone(&self.file),
        }
    }
}
