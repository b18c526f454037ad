//! Message broker abstraction.
//!
//! A broker moves opaque string payloads between named channels. Providers
//! have an explicit lifecycle (`connect` .. `close`) and are injected into
//! the fan-out layer so tests can run against an in-process implementation.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::result::AppResult;

/// A message delivered on a subscribed channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    /// Channel the message arrived on.
    pub channel: String,
    /// Raw payload as published.
    pub payload: String,
}

/// Publish/subscribe transport.
#[async_trait]
pub trait MessageBroker: Send + Sync + 'static {
    /// Human-readable provider name.
    fn provider_name(&self) -> &str;

    /// Establish the connection. Failures are reported but a provider may
    /// keep retrying in the background.
    async fn connect(&self) -> AppResult<()>;

    /// Publish a payload to a channel.
    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()>;

    /// Deliver every message on `channel` into `sink` until unsubscribed.
    async fn subscribe(&self, channel: &str, sink: mpsc::Sender<BrokerMessage>) -> AppResult<()>;

    /// Stop delivering messages for `channel`.
    async fn unsubscribe(&self, channel: &str) -> AppResult<()>;

    /// Release all resources. Subsequent publishes fail.
    async fn close(&self) -> AppResult<()>;

    /// Whether the provider currently believes it is connected.
    fn is_connected(&self) -> bool;
}
