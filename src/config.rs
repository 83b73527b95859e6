//! Configuration management for loralink.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent::AgentConfig;
use crate::error::{Error, Result};
use crate::types::DeviceAddress;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Node identity.
    #[serde(default)]
    pub node: NodeConfig,

    /// Session link timing.
    #[serde(default)]
    pub link: LinkConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.link.transmit_duration.is_zero() {
            return Err(Error::InvalidConfig(
                "link transmit duration must be nonzero".into(),
            ));
        }
        Ok(())
    }

    /// Create example configuration.
    pub fn example() -> Self {
        Self {
            node: NodeConfig {
                address: 0x0000_0001,
            },
            ..Default::default()
        }
    }

    /// The agent parameters this configuration describes.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            address: DeviceAddress(self.node.address),
            transmit_duration: self.link.transmit_duration,
            gap_duration: self.link.gap_duration,
        }
    }
}

/// Node identity configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Link-layer address of this device.
    #[serde(default)]
    pub address: u32,
}

/// Session link timing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Length of each peer's transmission slot.
    #[serde(default = "default_transmit_duration", with = "humantime_serde")]
    pub transmit_duration: Duration,

    /// Idle gap between transmission slots. May be zero.
    #[serde(default = "default_gap_duration", with = "humantime_serde")]
    pub gap_duration: Duration,
}

fn default_transmit_duration() -> Duration {
    Duration::from_millis(800)
}
fn default_gap_duration() -> Duration {
    Duration::from_millis(200)
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            transmit_duration: default_transmit_duration(),
            gap_duration: default_gap_duration(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text or json).
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output.
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}
fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            color: default_color(),
        }
    }
}

/// Initialize logging.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    } else {
        subscriber
            .with(fmt::layer().with_ansi(config.color))
            .try_init()
            .map_err(|e| Error::Config(format!("Failed to init logging: {e}")))?;
    }

    Ok(())
}
