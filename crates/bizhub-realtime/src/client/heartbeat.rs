//! Client heartbeat loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::source::HeartbeatSink;

/// Beat for `device_id` every `interval` until cancelled. The first beat is
/// sent immediately; failures are logged and the loop keeps going.
pub fn spawn_heartbeat(
    sink: Arc<dyn HeartbeatSink>,
    device_id: String,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = sink.beat(&device_id).await {
                        warn!(device_id = %device_id, error = %e, "Heartbeat failed");
                    }
                }
            }
        }
        debug!(device_id = %device_id, "Heartbeat loop stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bizhub_core::result::AppResult;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    #[async_trait]
    impl HeartbeatSink for Counter {
        async fn beat(&self, _device_id: &str) -> AppResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_beats_on_interval_until_cancelled() {
        let counter = Arc::new(Counter::default());
        let cancel = CancellationToken::new();
        let handle = spawn_heartbeat(
            counter.clone(),
            "dev-1".to_string(),
            Duration::from_secs(60),
            cancel.clone(),
        );

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 3);
    }
}
