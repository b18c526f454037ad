//! Broker providers.
//!
//! The provider is selected at runtime based on configuration.

pub mod memory;
#[cfg(feature = "redis-pubsub")]
pub mod redis;

use std::sync::Arc;

use tracing::info;

use bizhub_core::config::BrokerConfig;
use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;
use bizhub_core::traits::MessageBroker;

pub use memory::MemoryBroker;
#[cfg(feature = "redis-pubsub")]
pub use self::redis::RedisBroker;

/// Build and connect the broker named by `config.provider`.
pub async fn connect_broker(config: &BrokerConfig) -> AppResult<Arc<dyn MessageBroker>> {
    let broker: Arc<dyn MessageBroker> = match config.provider.as_str() {
        #[cfg(feature = "redis-pubsub")]
        "redis" => {
            info!("Initializing Redis pub/sub broker");
            Arc::new(RedisBroker::new(config)?)
        }
        "memory" => {
            info!("Initializing in-memory broker");
            Arc::new(MemoryBroker::new())
        }
        other => {
            return Err(AppError::configuration(format!(
                "Unknown broker provider: '{other}'. Supported: memory, redis"
            )));
        }
    };

    broker.connect().await?;
    Ok(broker)
}
