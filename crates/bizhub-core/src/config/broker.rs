//! Pub/sub broker configuration.

use serde::{Deserialize, Serialize};

/// Broker provider selection and delivery tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker provider: `"memory"` or `"redis"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis connection URL (used when `provider = "redis"`).
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    /// Optional prefix prepended to every channel name.
    #[serde(default)]
    pub channel_prefix: String,
    /// Seconds between reconnect attempts and outbound queue retries.
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_seconds: u64,
    /// Capacity of the outbound publish queue.
    #[serde(default = "default_queue_size")]
    pub outbound_queue_size: usize,
    /// Number of publish attempts made by fan-out before giving up.
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: u32,
    /// Initial backoff between publish attempts, doubled each retry.
    #[serde(default = "default_backoff_ms")]
    pub publish_backoff_ms: u64,
}

impl BrokerConfig {
    /// Resolve the physical channel name for a logical channel.
    pub fn channel_name(&self, logical: &str) -> String {
        if self.channel_prefix.is_empty() {
            logical.to_string()
        } else {
            format!("{}{}", self.channel_prefix, logical)
        }
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis_url: default_redis_url(),
            channel_prefix: String::new(),
            reconnect_interval_seconds: default_reconnect_interval(),
            outbound_queue_size: default_queue_size(),
            publish_attempts: default_publish_attempts(),
            publish_backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_reconnect_interval() -> u64 {
    5
}

fn default_queue_size() -> usize {
    1024
}

fn default_publish_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    200
}
