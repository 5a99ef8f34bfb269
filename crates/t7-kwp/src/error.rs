//! Protocol-level errors

use thiserror::Error;

use crate::kwp::ResponseCode;
use crate::transport::TransportError;

#[derive(Debug, Error, Clone)]
pub enum KwpError {
    #[error("Response timeout: {0}")]
    Timeout(String),

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("Request rejected: {0}")]
    ProtocolRejected(String),

    #[error("Negative response: {code} (0x{code:02X}) for service 0x{service:02X}")]
    EcuError { service: u8, code: ResponseCode },

    #[error("Security access was not granted")]
    AccessDenied,

    #[error("No active session")]
    NoSession,

    #[error("Transport error: {0}")]
    Transport(String),
}

impl KwpError {
    /// Negative response code carried by this error, if any
    pub fn response_code(&self) -> Option<ResponseCode> {
        match self {
            Self::EcuError { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<TransportError> for KwpError {
    fn from(err: TransportError) -> Self {
        match err {
            e if e.is_timeout() => Self::Timeout(e.to_string()),
            e => Self::Transport(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_timeout_maps_to_timeout() {
        let err: KwpError = TransportError::Timeout {
            response_id: 0x258,
            request: "0x240 [40A10221F0]".into(),
            timeout: std::time::Duration::from_millis(50),
        }
        .into();
        match err {
            KwpError::Timeout(msg) => {
                assert_eq!(msg, "No reply on 0x258 to 0x240 [40A10221F0] within 50ms")
            }
            other => panic!("unexpected {:?}", other),
        }

        let err: KwpError = TransportError::ConnectionClosed.into();
        assert!(matches!(err, KwpError::Transport(_)));
    }

    #[test]
    fn ecu_error_display_uses_reason() {
        let err = KwpError::EcuError {
            service: 0x27,
            code: ResponseCode::from(0x35),
        };
        assert_eq!(
            err.to_string(),
            "Negative response: invalid key (0x35) for service 0x27"
        );
        assert_eq!(err.response_code(), Some(ResponseCode::InvalidKey));
    }
}
