//! Transport layer for KWP2000 communication
//!
//! This module provides transport adapters for talking to the ECU:
//! - SocketCAN adapter for raw CAN frames (Linux only)
//! - Mock adapter simulating a Trionic 7 for testing
//!
//! # Example
//!
//! ```ignore
//! use t7_kwp::transport::{create_transport, CanFrame};
//! use t7_kwp::config::TransportConfig;
//!
//! let config = TransportConfig::Mock(Default::default());
//! let transport = create_transport(&config).await?;
//! let reply = transport
//!     .send_and_poll(CanFrame::response_required(0x220, init), Duration::from_millis(250), 0x238)
//!     .await?;
//! ```

mod adapter;
pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use adapter::{CanFrame, CanTransport, FrameKind, FrameSubscription, MAX_FRAME_LEN};
pub use error::TransportError;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::TransportConfig;

/// Create a transport adapter based on configuration
pub async fn create_transport(
    config: &TransportConfig,
) -> Result<Arc<dyn CanTransport>, TransportError> {
    match config {
        #[cfg(all(target_os = "linux", feature = "socketcan"))]
        TransportConfig::SocketCan(cfg) => {
            let adapter = socketcan::SocketCanAdapter::new(cfg).await?;
            Ok(Arc::new(adapter))
        }
        #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
        TransportConfig::SocketCan(_) => Err(TransportError::Unsupported(
            "SocketCAN requires Linux and the 'socketcan' feature".to_string(),
        )),
        TransportConfig::Mock(cfg) => {
            let adapter = mock::MockTransport::new(cfg);
            Ok(Arc::new(adapter))
        }
    }
}

/// Opens a fresh transport for every connection attempt
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn open(&self) -> Result<Arc<dyn CanTransport>, TransportError>;
}

#[async_trait]
impl TransportFactory for TransportConfig {
    async fn open(&self) -> Result<Arc<dyn CanTransport>, TransportError> {
        create_transport(self).await
    }
}

/// Hands out the same simulated ECU on every open, so its state survives
/// session restarts.
#[async_trait]
impl TransportFactory for Arc<mock::MockTransport> {
    async fn open(&self) -> Result<Arc<dyn CanTransport>, TransportError> {
        self.reopen();
        Ok(self.clone())
    }
}
