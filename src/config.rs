//! Startup configuration
//!
//! Values are merged in this order, later sources win: built-in defaults, the TOML
//! config file, environment variables, command line flags. Environment and flags are
//! both handled by clap, a flag beats its environment variable.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::mqtt::{ConnectionString, MqttSettings, TransportKind};
use crate::publisher::ConnectionError;

const CONFIG_DIR: &str = "iot-telemetry";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No connection string configured (config file, IOT_CONNECTION_STRING or --connection-string)")]
    MissingConnectionString,

    #[error("Publish interval must be greater than zero")]
    InvalidInterval,
}

/// Command line of the simulator
#[derive(Parser, Debug, Default)]
#[command(name = "iot-telemetry", version, about = "Simulated IoT telemetry publisher")]
pub struct Cli {
    /// Config file, defaults to <config dir>/iot-telemetry/config.toml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Device connection string
    #[arg(long, env = "IOT_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// Transport used for the device link
    #[arg(long, env = "IOT_TRANSPORT", value_enum)]
    pub transport: Option<TransportKind>,

    /// Milliseconds between two messages
    #[arg(long, env = "IOT_INTERVAL_MS")]
    pub interval_ms: Option<u64>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PublisherConfig {
    pub connection_string: Option<String>,
    pub transport: TransportKind,
    pub interval_ms: u64,
    pub keep_alive_secs: u64,
    pub client_capacity: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            transport: TransportKind::default(),
            interval_ms: 1000,
            keep_alive_secs: 30,
            client_capacity: 10,
        }
    }
}

impl PublisherConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub async fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
        Self::from_toml_str(&content)
    }

    /// Builds the effective configuration for this run.
    ///
    /// An explicit `--config` path has to exist, the default path is optional.
    pub async fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => {
                info!("Loading config from {}", path.display());
                Self::load_file(path).await?
            }
            None => match Self::default_path() {
                Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => {
                    info!("Loading config from {}", path.display());
                    Self::load_file(&path).await?
                }
                _ => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(connection_string) = &cli.connection_string {
            self.connection_string = Some(connection_string.clone());
        }
        if let Some(transport) = cli.transport {
            self.transport = transport;
        }
        if let Some(interval_ms) = cli.interval_ms {
            self.interval_ms = interval_ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.connection_string.as_deref() {
            Some(s) if !s.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingConnectionString),
        }
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn mqtt_settings(&self) -> Result<MqttSettings, ConnectionError> {
        let connection: ConnectionString = self
            .connection_string
            .as_deref()
            .unwrap_or_default()
            .parse()?;

        Ok(MqttSettings {
            connection,
            transport: self.transport,
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            capacity: self.client_capacity,
        })
    }
}
