//! CAN transport trait and frame types

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error as broadcast_error};

use super::TransportError;

/// Maximum payload of a classic CAN frame
pub const MAX_FRAME_LEN: usize = 8;

/// How the sender expects a frame to be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Plain outgoing frame, nothing expected back
    Outgoing,
    /// The peer is expected to answer this frame
    ResponseRequired,
}

/// A single CAN frame with an 11-bit identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub data: Vec<u8>,
    pub kind: FrameKind,
}

impl CanFrame {
    pub fn new(id: u32, data: impl Into<Vec<u8>>, kind: FrameKind) -> Self {
        Self {
            id,
            data: data.into(),
            kind,
        }
    }

    pub fn outgoing(id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self::new(id, data, FrameKind::Outgoing)
    }

    pub fn response_required(id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self::new(id, data, FrameKind::ResponseRequired)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Byte at `index`, or `None` for short frames
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data.get(index).copied()
    }

    pub fn validate(&self) -> Result<(), TransportError> {
        if self.data.len() > MAX_FRAME_LEN {
            return Err(TransportError::InvalidFrame(format!(
                "0x{:03X}: {} bytes exceeds {} byte payload",
                self.id,
                self.data.len(),
                MAX_FRAME_LEN
            )));
        }
        if self.id > 0x7FF {
            return Err(TransportError::InvalidFrame(format!(
                "0x{:X} is not an 11-bit identifier",
                self.id
            )));
        }
        Ok(())
    }
}

impl fmt::Display for CanFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X} [{}]", self.id, hex::encode_upper(&self.data))
    }
}

/// Receiver for frames carrying one CAN identifier
pub struct FrameSubscription {
    id: u32,
    rx: broadcast::Receiver<CanFrame>,
}

impl FrameSubscription {
    pub fn new(id: u32, rx: broadcast::Receiver<CanFrame>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Wait for the next frame with the subscribed identifier
    pub async fn recv(&mut self) -> Result<CanFrame, TransportError> {
        loop {
            match self.rx.recv().await {
                Ok(frame) if frame.id == self.id => return Ok(frame),
                Ok(_) => continue,
                Err(broadcast_error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(id = self.id, skipped, "Subscription lagged");
                    continue;
                }
                Err(broadcast_error::RecvError::Closed) => {
                    return Err(TransportError::ConnectionClosed)
                }
            }
        }
    }
}

/// Point-to-point CAN link used by the protocol client
///
/// Implementations broadcast every received frame to all subscribers; the
/// default `send_and_poll` subscribes before sending so a fast reply is
/// never missed.
#[async_trait]
pub trait CanTransport: Send + Sync {
    /// Send a frame without waiting for anything
    async fn send(&self, frame: CanFrame) -> Result<(), TransportError>;

    /// Subscribe to incoming frames with the given identifier
    fn subscribe(&self, id: u32) -> FrameSubscription;

    /// Release the underlying link
    async fn close(&self) -> Result<(), TransportError>;

    /// Send a frame and wait for the first reply carrying `response_id`
    async fn send_and_poll(
        &self,
        frame: CanFrame,
        timeout: Duration,
        response_id: u32,
    ) -> Result<CanFrame, TransportError> {
        let mut sub = self.subscribe(response_id);
        let request = frame.to_string();
        self.send(frame).await?;

        match tokio::time::timeout(timeout, sub.recv()).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                response_id,
                request,
                timeout,
            }),
        }
    }
}
