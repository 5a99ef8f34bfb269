//! Protocol and transport configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing parameters for the protocol client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KwpConfig {
    /// Timeout for single-frame requests and session start
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Timeout for the first frame of a polled data reply
    #[serde(default = "default_first_frame_timeout_ms")]
    pub first_frame_timeout_ms: u64,
    /// Timeout for each continuation frame after an acknowledgement
    #[serde(default = "default_continuation_timeout_ms")]
    pub continuation_timeout_ms: u64,
    /// Pause after a failed security access method
    #[serde(default = "default_security_retry_delay_ms")]
    pub security_retry_delay_ms: u64,
}

fn default_timeout_ms() -> u64 {
    250
}

fn default_first_frame_timeout_ms() -> u64 {
    50
}

fn default_continuation_timeout_ms() -> u64 {
    450
}

fn default_security_retry_delay_ms() -> u64 {
    3000
}

impl Default for KwpConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            first_frame_timeout_ms: default_first_frame_timeout_ms(),
            continuation_timeout_ms: default_continuation_timeout_ms(),
            security_retry_delay_ms: default_security_retry_delay_ms(),
        }
    }
}

impl KwpConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    pub fn first_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.first_frame_timeout_ms)
    }

    pub fn continuation_timeout(&self) -> Duration {
        Duration::from_millis(self.continuation_timeout_ms)
    }

    pub fn security_retry_delay(&self) -> Duration {
        Duration::from_millis(self.security_retry_delay_ms)
    }
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    /// Raw CAN frames over SocketCAN (Linux only)
    SocketCan(SocketCanConfig),
    /// Simulated Trionic 7 for testing
    Mock(MockConfig),
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Mock(MockConfig::default())
    }
}

/// SocketCAN configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketCanConfig {
    /// CAN interface name (e.g., "can0")
    pub interface: String,
}

/// Mock transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockConfig {
    /// Simulated latency in milliseconds
    #[serde(default)]
    pub latency_ms: u64,
    /// Security access method the simulated ECU accepts (none = never)
    #[serde(default = "default_security_method")]
    pub security_method: Option<u8>,
    /// Seed handed out on security access requests
    #[serde(default = "default_seed")]
    pub seed: u16,
}

fn default_security_method() -> Option<u8> {
    Some(0)
}

fn default_seed() -> u16 {
    0x1234
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            latency_ms: 0,
            security_method: default_security_method(),
            seed: default_seed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_config_is_tagged_by_type() {
        let config = parse(r#"{ "type": "socketcan", "interface": "can0" }"#);
        match config {
            TransportConfig::SocketCan(cfg) => assert_eq!(cfg.interface, "can0"),
            other => panic!("unexpected transport: {:?}", other),
        }

        let config = parse(r#"{ "type": "mock", "security_method": 3 }"#);
        match config {
            TransportConfig::Mock(cfg) => {
                assert_eq!(cfg.security_method, Some(3));
                assert_eq!(cfg.seed, 0x1234);
                assert_eq!(cfg.latency_ms, 0);
            }
            other => panic!("unexpected transport: {:?}", other),
        }
    }

    #[test]
    fn kwp_defaults() {
        let config: KwpConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.default_timeout(), Duration::from_millis(250));
        assert_eq!(config.first_frame_timeout(), Duration::from_millis(50));
        assert_eq!(config.continuation_timeout(), Duration::from_millis(450));
        assert_eq!(config.security_retry_delay(), Duration::from_secs(3));
    }

    fn parse(json: &str) -> TransportConfig {
        serde_json::from_str(json).unwrap()
    }
}
