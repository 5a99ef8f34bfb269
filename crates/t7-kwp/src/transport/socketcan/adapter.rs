//! SocketCAN adapter exchanging raw 11-bit CAN frames

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use socketcan::{CanFrame as RawFrame, CanSocket, EmbeddedFrame, Frame, Socket, StandardId};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::SocketCanConfig;
use crate::transport::{CanFrame, CanTransport, FrameSubscription, TransportError};

/// SocketCAN adapter using a raw CAN socket
pub struct SocketCanAdapter {
    socket: Arc<Mutex<CanSocket>>,
    connected: Arc<AtomicBool>,
    incoming_tx: broadcast::Sender<CanFrame>,
    listener_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SocketCanAdapter {
    pub async fn new(config: &SocketCanConfig) -> Result<Self, TransportError> {
        let mut socket = Self::create_socket(config)?;

        // Drain any stale frames left over from a previous session
        Self::drain_socket(&mut socket);

        let (incoming_tx, _) = broadcast::channel(1024);

        let adapter = Self {
            socket: Arc::new(Mutex::new(socket)),
            connected: Arc::new(AtomicBool::new(true)),
            incoming_tx,
            listener_handle: Mutex::new(None),
        };

        adapter.start_listener();
        tracing::info!(interface = %config.interface, "SocketCAN transport opened");

        Ok(adapter)
    }

    fn create_socket(config: &SocketCanConfig) -> Result<CanSocket, TransportError> {
        let socket = CanSocket::open(&config.interface).map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "Failed to open CAN socket on {}: {}",
                config.interface, e
            ))
        })?;

        // Non-blocking so the listener can poll the connected flag
        socket.set_nonblocking(true).map_err(|e| {
            TransportError::InvalidConfig(format!("Failed to set non-blocking: {}", e))
        })?;

        Ok(socket)
    }

    fn drain_socket(socket: &mut CanSocket) {
        while let Ok(frame) = socket.read_frame() {
            tracing::debug!(id = frame.raw_id(), "Drained stale frame from socket");
        }
    }

    fn start_listener(&self) {
        let socket = self.socket.clone();
        let incoming_tx = self.incoming_tx.clone();
        let connected = self.connected.clone();

        let handle = tokio::task::spawn_blocking(move || {
            while connected.load(Ordering::SeqCst) {
                let result = socket.lock().read_frame();
                match result {
                    Ok(raw) => {
                        let frame = CanFrame::outgoing(raw.raw_id(), raw.data().to_vec());
                        tracing::debug!(frame = %frame, "Incoming frame");
                        // No receivers is fine
                        let _ = incoming_tx.send(frame);
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "SocketCAN read error");
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
            tracing::debug!("SocketCAN listener stopped");
        });

        *self.listener_handle.lock() = Some(handle);
    }
}

#[async_trait]
impl CanTransport for SocketCanAdapter {
    async fn send(&self, frame: CanFrame) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        frame.validate()?;

        let id = StandardId::new(frame.id as u16).ok_or_else(|| {
            TransportError::InvalidFrame(format!("Invalid standard CAN ID: 0x{:X}", frame.id))
        })?;
        let raw = RawFrame::new(id, frame.data())
            .ok_or_else(|| TransportError::InvalidFrame(frame.to_string()))?;

        let socket = self.socket.clone();
        tokio::task::spawn_blocking(move || {
            socket
                .lock()
                .write_frame(&raw)
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
        .await
        .map_err(|e| TransportError::SendFailed(format!("Task join error: {}", e)))??;

        tracing::debug!(frame = %frame, "Sent frame");
        Ok(())
    }

    fn subscribe(&self, id: u32) -> FrameSubscription {
        FrameSubscription::new(id, self.incoming_tx.subscribe())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.connected.store(false, Ordering::SeqCst);
        let handle = self.listener_handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| TransportError::ConnectionFailed(format!("Listener join error: {}", e)))?;
        }
        Ok(())
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
