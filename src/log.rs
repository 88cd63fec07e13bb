use std::path::Path;
use std::sync::Mutex;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::LOG_FILE;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Sink for log lines. Every component gets one handed in instead of reaching for a global.
pub trait Logger: Send + Sync {
    fn log(&self, level: Level, message: &str);
}

/// Forwards to `tracing`; what happens next is decided by the subscriber `init_tracing` installs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: Level, message: &str) {
        match level {
            Level::Debug => tracing::debug!(target: "app", "{message}"),
            Level::Info => tracing::info!(target: "app", "{message}"),
            Level::Warn => tracing::warn!(target: "app", "{message}"),
            Level::Error => tracing::error!(target: "app", "{message}"),
        }
    }
}

/// Keeps every line in memory. Handy for asserting on what a component reported.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<(Level, String)>>,
}

impl MemoryLogger {
    pub fn lines(&self) -> Vec<(Level, String)> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn count(&self, level: Level) -> usize {
        self.lines().iter().filter(|(l, _)| *l == level).count()
    }

    pub fn contains(&self, level: Level, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, msg)| *l == level && msg.contains(needle))
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push((level, message.to_string()));
        }
    }
}

/// Installs the process-wide subscriber: timestamped lines to stdout and to a daily rotated
/// `app.log` inside `logs_dir`.
///
/// Keep the returned guard alive until exit, dropping it flushes the file writer.
pub fn init_tracing(logs_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let timer = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,app=debug"));
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer.clone())
        .with_writer(std::io::stdout);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}
