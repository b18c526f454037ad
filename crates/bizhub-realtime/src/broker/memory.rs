//! In-memory broker for single-process deployments and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_core::traits::{BrokerMessage, MessageBroker};

/// In-memory pub/sub. Delivery is in publish order per channel.
#[derive(Debug)]
pub struct MemoryBroker {
    /// Channel name → subscriber sinks
    channels: RwLock<HashMap<String, Vec<mpsc::Sender<BrokerMessage>>>>,
    connected: AtomicBool,
    /// Remaining publishes to reject, for exercising retry paths.
    fail_next: AtomicU32,
}

impl MemoryBroker {
    /// Create a connected broker with no subscribers.
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(true),
            fail_next: AtomicU32::new(0),
        }
    }

    /// Simulate losing or regaining the connection.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Reject the next `n` publishes with `BrokerUnavailable`.
    pub fn fail_next_publishes(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Number of live sinks on a channel.
    pub async fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map(|sinks| sinks.iter().filter(|s| !s.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    fn provider_name(&self) -> &str {
        "memory"
    }

    async fn connect(&self) -> AppResult<()> {
        self.set_connected(true);
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        if !self.is_connected() {
            return Err(AppError::broker_unavailable("In-memory broker is closed"));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(AppError::broker_unavailable("Injected publish failure"));
        }

        let sinks = self
            .channels
            .read()
            .await
            .get(channel)
            .cloned()
            .unwrap_or_default();

        for sink in sinks {
            let message = BrokerMessage {
                channel: channel.to_string(),
                payload: payload.to_string(),
            };
            if sink.send(message).await.is_err() {
                debug!(channel, "Dropping message for closed subscriber");
            }
        }
        Ok(())
    }

    async fn subscribe(&self, channel: &str, sink: mpsc::Sender<BrokerMessage>) -> AppResult<()> {
        let mut channels = self.channels.write().await;
        let sinks = channels.entry(channel.to_string()).or_default();
        sinks.retain(|s| !s.is_closed());
        if !sinks.iter().any(|s| s.same_channel(&sink)) {
            sinks.push(sink);
        }
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> AppResult<()> {
        self.channels.write().await.remove(channel);
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.set_connected(false);
        self.channels.write().await.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers_in_order() {
        let broker = MemoryBroker::new();
        let (tx, mut rx) = mpsc::channel(8);
        broker.subscribe("sales_notifications", tx).await.unwrap();

        broker.publish("sales_notifications", "a").await.unwrap();
        broker.publish("pricing_notifications", "x").await.unwrap();
        broker.publish("sales_notifications", "b").await.unwrap();

        assert_eq!(rx.recv().await.unwrap().payload, "a");
        assert_eq!(rx.recv().await.unwrap().payload, "b");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnected_publish_is_broker_unavailable() {
        let broker = MemoryBroker::new();
        broker.set_connected(false);
        let err = broker.publish("broadcast_notifications", "x").await.unwrap_err();
        assert_eq!(err.kind, bizhub_core::error::ErrorKind::BrokerUnavailable);
    }

    #[tokio::test]
    async fn test_injected_failures_run_out() {
        let broker = MemoryBroker::new();
        broker.fail_next_publishes(2);
        assert!(broker.publish("c", "1").await.is_err());
        assert!(broker.publish("c", "2").await.is_err());
        assert!(broker.publish("c", "3").await.is_ok());
    }
}
