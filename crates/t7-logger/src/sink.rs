//! Delivery of captured samples to live consumers

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// One captured sample as delivered to sinks
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogMessage {
    pub timestamp: DateTime<Utc>,
    pub payload: String,
}

/// Consumer of captured samples
///
/// `push` must not block; slow consumers lose messages rather than stall
/// the engine.
pub trait Sink: Send + Sync {
    fn push(&self, message: LogMessage);
}

/// Sink that fans messages out over a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<LogMessage>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogMessage> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl Sink for BroadcastSink {
    fn push(&self, message: LogMessage) {
        // No receivers is fine
        let _ = self.tx.send(message);
    }
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn push(&self, _message: LogMessage) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(payload: &str) -> LogMessage {
        LogMessage {
            timestamp: Utc::now(),
            payload: payload.to_string(),
        }
    }

    #[tokio::test]
    async fn broadcast_delivers_to_subscribers() {
        let sink = BroadcastSink::new(8);
        let mut rx = sink.subscribe();
        sink.push(message("12:100"));
        assert_eq!(rx.recv().await.unwrap().payload, "12:100");
    }

    #[test]
    fn push_without_subscribers() {
        BroadcastSink::new(8).push(message("x"));
    }

    #[tokio::test]
    async fn lagging_subscriber_loses_messages() {
        let sink = BroadcastSink::new(2);
        let mut rx = sink.subscribe();
        for i in 0..4 {
            sink.push(message(&i.to_string()));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(2))
        ));
        assert_eq!(rx.recv().await.unwrap().payload, "2");
    }
}
