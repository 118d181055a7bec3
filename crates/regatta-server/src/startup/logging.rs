//! File-based logging with per-component routing.
//!
//! Every event reaches the root file; events whose `tracing` target matches a
//! component prefix are additionally written to that component's file:
//!
//! | Log File            | Component                               | Target Prefixes     |
//! |---------------------|-----------------------------------------|---------------------|
//! | regatta.log         | Root logger (all components)            | (all)               |
//! | raft-registry.log   | Group registry, liveness, address feeds | regatta_consistency |
//! | cluster.log         | Messaging, gossip, failure detection    | regatta_core        |
//! | persistence.log     | Replica identity storage                | regatta_persistence |
//!
//! Files are written under `<data_dir>/logs` unless `logging.dir` is set.

use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Registry, fmt};

type BoxedLayer = Box<dyn tracing_subscriber::Layer<Registry> + Send + Sync>;

const ROOT_LOG_FILE: &str = "regatta.log";

/// (file name, routed target prefixes)
const COMPONENT_FILES: &[(&str, &[&str])] = &[
    ("raft-registry.log", &["regatta_consistency"]),
    ("cluster.log", &["regatta_core"]),
    ("persistence.log", &["regatta_persistence"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Daily,
    Hourly,
    /// Single file
    Never,
}

impl LogRotation {
    fn policy(self) -> Rotation {
        match self {
            Self::Daily => Rotation::DAILY,
            Self::Hourly => Rotation::HOURLY,
            Self::Never => Rotation::NEVER,
        }
    }
}

/// Where and how much the process logs
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub console_output: bool,
    pub console_level: Level,
    pub file_logging: bool,
    /// Level of the root file; component files capture everything from their targets
    pub file_level: Level,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("data/logs"),
            console_output: true,
            console_level: Level::INFO,
            file_logging: true,
            file_level: Level::INFO,
            rotation: LogRotation::Daily,
        }
    }
}

/// Keeps the non-blocking file writers alive.
///
/// Dropping it flushes whatever is still buffered, so it must outlive every
/// component that logs.
pub struct LoggingGuard {
    _writers: Vec<WorkerGuard>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over the configured levels for the console and
/// the root file.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard, Box<dyn std::error::Error>> {
    let mut writers = Vec::new();
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.console_output {
        layers.push(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_filter(level_from_env(config.console_level))
                .boxed(),
        );
    }

    if config.file_logging {
        std::fs::create_dir_all(&config.log_dir)?;

        let root = rolling_writer(&config.log_dir, ROOT_LOG_FILE, config.rotation, &mut writers);
        layers.push(
            file_layer(root)
                .with_filter(level_from_env(config.file_level))
                .boxed(),
        );

        for (file_name, prefixes) in COMPONENT_FILES {
            let writer = rolling_writer(&config.log_dir, file_name, config.rotation, &mut writers);
            layers.push(file_layer(writer).with_filter(routed(prefixes)).boxed());
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| format!("Failed to install tracing subscriber: {}", e))?;

    if config.file_logging {
        tracing::info!(
            log_dir = %config.log_dir.display(),
            files = COMPONENT_FILES.len() + 1,
            "File logging initialized"
        );
    }

    Ok(LoggingGuard { _writers: writers })
}

fn level_from_env(default: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default.to_string()))
}

fn rolling_writer(
    dir: &Path,
    file_name: &str,
    rotation: LogRotation,
    writers: &mut Vec<WorkerGuard>,
) -> NonBlocking {
    let appender = RollingFileAppender::new(rotation.policy(), dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    writers.push(guard);
    writer
}

fn file_layer(
    writer: NonBlocking,
) -> fmt::Layer<Registry, fmt::format::DefaultFields, fmt::format::Format, NonBlocking> {
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
}

/// Everything at any level from the given target prefixes
fn routed(prefixes: &[&str]) -> Targets {
    prefixes
        .iter()
        .fold(Targets::new(), |targets, prefix| {
            targets.with_target(*prefix, LevelFilter::TRACE)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_policies() {
        assert_eq!(LogRotation::Daily.policy(), Rotation::DAILY);
        assert_eq!(LogRotation::Hourly.policy(), Rotation::HOURLY);
        assert_eq!(LogRotation::Never.policy(), Rotation::NEVER);
    }

    #[test]
    fn test_registry_events_have_their_own_file() {
        let (_, prefixes) = COMPONENT_FILES
            .iter()
            .find(|(name, _)| *name == "raft-registry.log")
            .unwrap();
        let filter = routed(prefixes);

        assert!(filter.would_enable("regatta_consistency::raft::registry", &Level::DEBUG));
        assert!(!filter.would_enable("regatta_core::gossip", &Level::INFO));
    }

    #[test]
    fn test_component_files_are_distinct() {
        let mut names: Vec<&str> = COMPONENT_FILES.iter().map(|(name, _)| *name).collect();
        names.push(ROOT_LOG_FILE);
        let count = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), count);
    }
}
