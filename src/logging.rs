//! Logging
//!
//! File logging bootstrap for applications embedding the client, and the
//! per-action log level table the transport consults.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::level_filters::LevelFilter;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Log level for the file logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    #[default]
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl FromStr for LogLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            other => Err(anyhow::anyhow!("Unknown log level: {}", other)),
        }
    }
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

/// Per-action overrides of the client log level
#[derive(Debug, Clone, Default)]
pub struct ActionLevels {
    levels: HashMap<String, LevelFilter>,
}

impl ActionLevels {
    pub fn set(&mut self, action: &str, level: LevelFilter) {
        self.levels.insert(action.to_string(), level);
    }

    pub fn get(&self, action: &str) -> Option<LevelFilter> {
        self.levels.get(action).copied()
    }
}

/// Install a global file logger.
///
/// Returns the writer guard, which must be kept alive for buffered lines to
/// be flushed. `LogLevel::Off` installs nothing.
pub fn setup_logging(
    level: LogLevel,
    log_path: Option<&Path>,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let Some(tracing_level) = level.to_tracing_level() else {
        return Ok(None);
    };

    let log_path = log_path.map(Path::to_path_buf).unwrap_or_else(default_log_path);

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    // Another subscriber may already be installed by the host application.
    let installed = tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("ucloud-client logging at level: {:?}", level);
        tracing::info!("Log file: {:?}", log_path);
    }

    Ok(Some(guard))
}

fn default_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("ucloud-client").join("ucloud-client.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".ucloud").join("ucloud-client.log");
    }
    PathBuf::from("ucloud-client.log")
}
