//! CAN link errors

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum TransportError {
    #[error("Failed to open CAN link: {0}")]
    ConnectionFailed(String),

    #[error("CAN link closed")]
    ConnectionClosed,

    #[error("Failed to send frame: {0}")]
    SendFailed(String),

    #[error("No reply on 0x{response_id:03X} to {request} within {timeout:?}")]
    Timeout {
        response_id: u32,
        request: String,
        timeout: Duration,
    },

    #[error("Invalid CAN frame: {0}")]
    InvalidFrame(String),

    #[error("Invalid transport configuration: {0}")]
    InvalidConfig(String),

    #[error("Transport not available: {0}")]
    Unsupported(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
