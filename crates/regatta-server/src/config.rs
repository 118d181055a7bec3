//! Configuration management for the Regatta server
//!
//! Settings are layered, later sources winning:
//! - the YAML file (`conf/regatta.yml` unless `--config` says otherwise)
//! - `REGATTA_*` environment variables, `__` separating nested keys
//!   (e.g. `REGATTA_RAFT__TICK_INTERVAL_MS=50`)
//! - command line overrides

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment};
use serde::Deserialize;

use regatta_common::{RegattaError, Result};
use regatta_consistency::RegistryConfig;

use crate::startup::{LogRotation, LoggingConfig};

pub const DEFAULT_CONFIG_FILE: &str = "conf/regatta.yml";

/// Command line arguments for the server
#[derive(Debug, Parser)]
#[command(name = "regatta-server", version, about)]
pub struct Cli {
    /// Path of the YAML configuration file
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Address the echo responder listens on
    #[arg(short = 'l', long = "listen")]
    pub listen: Option<String>,
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<String>,
    /// Keep the registry inert
    #[arg(long = "disable-raft")]
    pub disable_raft: bool,
}

/// Logging section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Defaults to `<data_dir>/logs`
    pub dir: Option<String>,
    pub console: bool,
    pub file: bool,
    pub level: String,
    pub rotation: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            dir: None,
            console: true,
            file: true,
            level: "info".to_string(),
            rotation: "daily".to_string(),
        }
    }
}

/// Prometheus exporter section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
    pub listen_address: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_address: "0.0.0.0:9464".to_string(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub raft: RegistryConfig,
    /// Echo responder address; its port is also the one probed on peers
    pub listen_address: String,
    pub data_dir: String,
    /// Upper bound of a single liveness probe
    pub probe_timeout_ms: u64,
    /// Warn when the group drain on shutdown takes longer than this
    pub shutdown_timeout_secs: u64,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            raft: RegistryConfig::default(),
            listen_address: format!("0.0.0.0:{}", regatta_core::DEFAULT_ECHO_PORT),
            data_dir: "data".to_string(),
            probe_timeout_ms: 500,
            shutdown_timeout_secs: 30,
            logging: LoggingSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl ServerConfig {
    /// Load from the configuration file, the environment and `cli`
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with_env(cli, Environment::with_prefix("REGATTA"))
    }

    fn load_with_env(cli: &Cli, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(config::File::from(cli.config.as_path()).required(false))
            .add_source(
                environment
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        if let Some(v) = &cli.listen {
            builder = builder
                .set_override("listen_address", v.as_str())
                .map_err(config_error)?;
        }
        if let Some(v) = &cli.data_dir {
            builder = builder
                .set_override("data_dir", v.as_str())
                .map_err(config_error)?;
        }
        if cli.disable_raft {
            builder = builder
                .set_override("raft.enabled", false)
                .map_err(config_error)?;
        }

        let configuration: ServerConfig = builder
            .build()
            .and_then(|c| c.try_deserialize::<ServerConfig>())
            .map_err(config_error)?;
        configuration.validate()?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<()> {
        self.raft.validate()?;
        self.listen_socket_addr()?;
        self.metrics_socket_addr()?;
        if self.probe_timeout_ms == 0 {
            return Err(RegattaError::ConfigError(
                "probe_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn listen_socket_addr(&self) -> Result<SocketAddr> {
        parse_addr("listen_address", &self.listen_address)
    }

    pub fn metrics_socket_addr(&self) -> Result<SocketAddr> {
        parse_addr("metrics.listen_address", &self.metrics.listen_address)
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    /// Location of the RocksDB instance holding the replica id
    pub fn identity_path(&self) -> PathBuf {
        self.data_path().join("identity")
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn logging_config(&self) -> LoggingConfig {
        let log_dir = self
            .logging
            .dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_path().join("logs"));
        let level = self.logging.level.parse().unwrap_or(tracing::Level::INFO);
        let rotation = match self.logging.rotation.to_lowercase().as_str() {
            "hourly" => LogRotation::Hourly,
            "never" => LogRotation::Never,
            _ => LogRotation::Daily,
        };

        LoggingConfig {
            log_dir,
            console_output: self.logging.console,
            console_level: level,
            file_logging: self.logging.file,
            file_level: level,
            rotation,
        }
    }
}

fn parse_addr(key: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| RegattaError::ConfigError(format!("invalid {key} '{value}': {e}")))
}

fn config_error(e: config::ConfigError) -> RegattaError {
    RegattaError::ConfigError(e.to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["regatta-server"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    // A prefix no test environment sets
    fn isolated_env() -> Environment {
        Environment::with_prefix("REGATTA_CONFIG_TEST_UNSET")
    }

    #[test]
    fn test_defaults_without_file() {
        let cli = cli(&["--config", "/nonexistent/regatta.yml"]);
        let configuration = ServerConfig::load_with_env(&cli, isolated_env()).unwrap();

        assert!(configuration.raft.enabled);
        assert_eq!(configuration.raft.tick_interval_ms, 100);
        assert_eq!(configuration.listen_address, "0.0.0.0:7010");
        assert_eq!(configuration.identity_path(), PathBuf::from("data/identity"));
        assert!(!configuration.metrics.enabled);
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(
            file,
            "raft:\n  tick_interval_ms: 50\n  shard_count: 4\nlisten_address: \"127.0.0.1:7100\"\nmetrics:\n  enabled: true\n"
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let configuration =
            ServerConfig::load_with_env(&cli(&["--config", &path]), isolated_env()).unwrap();

        assert_eq!(configuration.raft.tick_interval(), Duration::from_millis(50));
        assert_eq!(configuration.raft.shard_count, 4);
        assert_eq!(configuration.raft.failure_detector_interval_ms, 1000);
        assert_eq!(
            configuration.listen_socket_addr().unwrap(),
            "127.0.0.1:7100".parse::<SocketAddr>().unwrap()
        );
        assert!(configuration.metrics.enabled);
    }

    #[test]
    fn test_cli_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".yml").tempfile().unwrap();
        writeln!(file, "data_dir: /from/file\nlisten_address: \"0.0.0.0:1\"").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let cli = cli(&[
            "--config",
            &path,
            "--data-dir",
            "/from/cli",
            "--listen",
            "127.0.0.1:7200",
            "--disable-raft",
        ]);
        let configuration = ServerConfig::load_with_env(&cli, isolated_env()).unwrap();

        assert_eq!(configuration.data_dir, "/from/cli");
        assert_eq!(configuration.listen_address, "127.0.0.1:7200");
        assert!(!configuration.raft.enabled);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cli = cli(&["--config", "/nonexistent/regatta.yml", "--listen", "not-an-addr"]);
        let err = ServerConfig::load_with_env(&cli, isolated_env()).unwrap_err();
        assert!(matches!(err, RegattaError::ConfigError(_)));

        let configuration = ServerConfig {
            raft: RegistryConfig {
                shard_count: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(configuration.validate().is_err());
    }

    #[test]
    fn test_logging_config_defaults_under_data_dir() {
        let configuration = ServerConfig {
            data_dir: "/var/lib/regatta".to_string(),
            logging: LoggingSection {
                level: "debug".to_string(),
                rotation: "hourly".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let logging = configuration.logging_config();
        assert_eq!(logging.log_dir, PathBuf::from("/var/lib/regatta/logs"));
        assert_eq!(logging.console_level, tracing::Level::DEBUG);
        assert!(matches!(logging.rotation, LogRotation::Hourly));
    }
}
