//! Configuration file handling for t7log

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use t7_kwp::{KwpConfig, MockConfig, SocketCanConfig, TransportConfig};
use t7_logger::LoggerConfig;

/// Configuration for the CLI tool
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// CAN transport
    pub transport: Option<TransportConfig>,
    /// Protocol timing
    pub protocol: Option<KwpConfig>,
    /// Logging engine
    pub logger: Option<LoggerConfig>,
    /// Default output format
    pub output: Option<String>,
    /// Disable colored output
    pub no_color: Option<bool>,
}

impl Config {
    /// Load configuration from the default config file
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Get the default config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("t7log");

        Ok(config_dir.join("config.toml"))
    }

    /// Merge CLI arguments over config file values
    pub fn merge_with_args(&self, args: &ArgOverrides) -> MergedConfig {
        let transport = if args.mock {
            match &self.transport {
                Some(TransportConfig::Mock(cfg)) => TransportConfig::Mock(cfg.clone()),
                _ => TransportConfig::Mock(MockConfig::default()),
            }
        } else if let Some(interface) = &args.interface {
            TransportConfig::SocketCan(SocketCanConfig {
                interface: interface.clone(),
            })
        } else {
            self.transport.clone().unwrap_or_else(|| {
                TransportConfig::SocketCan(SocketCanConfig {
                    interface: "can0".to_string(),
                })
            })
        };

        let mut logger = self.logger.clone().unwrap_or_default();
        if let Some(frequency) = args.frequency {
            logger.frequency = frequency;
        }
        if let Some(max_attempts) = args.max_attempts {
            logger.max_attempts = max_attempts;
        }
        if let Some(log_dir) = &args.log_dir {
            logger.log_dir = log_dir.clone();
        }

        MergedConfig {
            transport,
            protocol: self.protocol.clone().unwrap_or_default(),
            logger,
            output: args
                .output
                .map(String::from)
                .or_else(|| self.output.clone())
                .unwrap_or_else(|| "table".to_string()),
            no_color: args.no_color || self.no_color.unwrap_or(false),
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ArgOverrides {
    pub interface: Option<String>,
    pub mock: bool,
    pub frequency: Option<u32>,
    pub max_attempts: Option<u32>,
    pub log_dir: Option<PathBuf>,
    pub output: Option<&'static str>,
    pub no_color: bool,
}

/// Fully resolved configuration after merging CLI args
#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub transport: TransportConfig,
    pub protocol: KwpConfig,
    pub logger: LoggerConfig,
    pub output: String,
    pub no_color: bool,
}
