//! Datalogging engine configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LoggerError;

/// Upper bound for `max_attempts`
pub const MAX_ATTEMPTS_LIMIT: u32 = 100;

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Polls per second
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    /// Session attempts before giving up, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Pause before a new attempt
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Pause between the stop request and the new session on a retry
    #[serde(default = "default_restart_pause_ms")]
    pub restart_pause_ms: u64,
    /// Failed polls tolerated within one second
    #[serde(default = "default_error_limit")]
    pub error_limit: u32,
    /// Directory receiving the log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_frequency() -> u32 {
    25
}

fn default_max_attempts() -> u32 {
    10
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_restart_pause_ms() -> u64 {
    100
}

fn default_error_limit() -> u32 {
    10
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            frequency: default_frequency(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            restart_pause_ms: default_restart_pause_ms(),
            error_limit: default_error_limit(),
            log_dir: default_log_dir(),
        }
    }
}

impl LoggerConfig {
    pub fn validate(&self) -> Result<(), LoggerError> {
        if self.frequency == 0 || self.frequency > 1000 {
            return Err(LoggerError::InvalidConfig(format!(
                "frequency must be 1-1000 Hz, got {}",
                self.frequency
            )));
        }
        if self.max_attempts == 0 || self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(LoggerError::InvalidConfig(format!(
                "max_attempts must be 1-{}, got {}",
                MAX_ATTEMPTS_LIMIT, self.max_attempts
            )));
        }
        Ok(())
    }

    pub fn poll_period(&self) -> Duration {
        Duration::from_secs(1) / self.frequency.max(1)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn restart_pause(&self) -> Duration {
        Duration::from_millis(self.restart_pause_ms)
    }
}
