//! t7-kwp - KWP2000-over-CAN protocol client for Trionic 7 ECUs
//!
//! This crate talks to a Trionic 7 engine control unit using the KWP2000
//! diagnostic protocol, carried over raw 8-byte CAN frames with the T7
//! chunking/acknowledgement scheme.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       KwpClient                             │
//! │  session start/stop, security access, routines, transfer,   │
//! │  dynamic local identifiers, memory reads                    │
//! │                                                             │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │ KwpConfig    │  │ SessionState │  │ VariableList     │   │
//! │  │ (timeouts)   │  │ (lock state) │  │ (definitions)    │   │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘   │
//! │                          │                                  │
//! │                   ┌──────┴──────┐                           │
//! │                   │ Chunk codec │                           │
//! │                   └──────┬──────┘                           │
//! │                          │                                  │
//! │                 ┌────────┴────────┐                         │
//! │                 │  CanTransport   │                         │
//! │                 │ (SocketCAN/mock)│                         │
//! │                 └─────────────────┘                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod definition;
pub mod error;
pub mod kwp;
pub mod transport;

pub use config::{KwpConfig, MockConfig, SocketCanConfig, TransportConfig};
pub use definition::{DefinitionError, Method, VariableDefinition, VariableList, VariableSnapshot};
pub use error::KwpError;
pub use kwp::{KwpClient, ResponseCode, SecurityState, SessionState};
pub use transport::{
    create_transport, CanFrame, CanTransport, FrameKind, FrameSubscription, TransportError,
    TransportFactory,
};
