//! Wiring for one client process.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bizhub_core::config::{NotificationsConfig, PresenceConfig};
use bizhub_core::result::AppResult;
use bizhub_core::traits::{BrokerMessage, MessageBroker};
use bizhub_entity::ModuleType;

use super::dismiss::AutoDismissScheduler;
use super::event::{ClientEvent, Origin};
use super::heartbeat::spawn_heartbeat;
use super::inbound::InboundRouter;
use super::source::{CatchUpSource, HeartbeatSink};
use crate::channel::ChannelType;
use crate::message::WireMessage;

const INBOX_CAPACITY: usize = 256;

/// Settings for a client runtime.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// This device.
    pub device_id: String,
    /// Module the client runs.
    pub module: ModuleType,
    /// Time between heartbeats.
    pub heartbeat_interval: Duration,
    /// Display time for non-sticky notifications; zero keeps them.
    pub auto_dismiss: Duration,
    /// Ids remembered for de-duplication.
    pub dedup_capacity: usize,
    /// How far before the newest delivered notification a resubscribe
    /// replays from. Late publishes inside the window are recovered;
    /// repeats are dropped by id.
    pub replay_window: Duration,
}

impl ClientConfig {
    /// Build from the shared configuration sections.
    pub fn from_settings(
        device_id: impl Into<String>,
        module: ModuleType,
        presence: &PresenceConfig,
        notifications: &NotificationsConfig,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            module,
            heartbeat_interval: Duration::from_secs(presence.heartbeat_interval_seconds),
            auto_dismiss: Duration::from_secs(notifications.auto_dismiss_seconds),
            dedup_capacity: notifications.dedup_capacity,
            replay_window: Duration::from_secs(notifications.replay_window_seconds),
        }
    }
}

/// A running client: subscriptions, heartbeats and catch-up.
///
/// The runtime never unsubscribes channels on the shared broker; closing
/// its receiver is enough for the broker to drop the sink.
pub struct ClientRuntime {
    config: ClientConfig,
    broker: Arc<dyn MessageBroker>,
    catch_up: Arc<dyn CatchUpSource>,
    router: Arc<InboundRouter>,
    dismiss: AutoDismissScheduler,
    sink: mpsc::Sender<BrokerMessage>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl std::fmt::Debug for ClientRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRuntime")
            .field("device_id", &self.config.device_id)
            .field("module", &self.config.module)
            .finish()
    }
}

impl ClientRuntime {
    /// Subscribe, start the heartbeat loop and replay anything missed.
    ///
    /// Returns the runtime and the receiver every client event arrives on.
    pub async fn start(
        config: ClientConfig,
        broker: Arc<dyn MessageBroker>,
        heartbeat: Arc<dyn HeartbeatSink>,
        catch_up: Arc<dyn CatchUpSource>,
    ) -> AppResult<(Self, mpsc::Receiver<ClientEvent>)> {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        let dismiss = AutoDismissScheduler::new(config.auto_dismiss, inbox_tx.clone());
        let router = Arc::new(InboundRouter::new(
            config.device_id.clone(),
            config.dedup_capacity,
            inbox_tx,
            dismiss.clone(),
        ));
        let (sink, mut messages) = mpsc::channel::<BrokerMessage>(INBOX_CAPACITY);
        let cancel = CancellationToken::new();

        let pump = {
            let router = router.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        message = messages.recv() => match message {
                            Some(message) => {
                                router.handle_payload(&message.payload).await;
                            }
                            None => break,
                        },
                    }
                }
                debug!(device_id = %router.device_id(), "Client pump stopped");
            })
        };
        let beats = spawn_heartbeat(
            heartbeat,
            config.device_id.clone(),
            config.heartbeat_interval,
            cancel.clone(),
        );

        let runtime = Self {
            config,
            broker,
            catch_up,
            router,
            dismiss,
            sink,
            cancel,
            tasks: vec![pump, beats],
        };
        runtime.subscribe_all().await?;
        runtime.catch_up(None).await;

        info!(
            device_id = %runtime.config.device_id,
            module = %runtime.config.module,
            "Client runtime started"
        );
        Ok((runtime, inbox_rx))
    }

    /// Re-subscribe after a reconnect and replay from the replay window
    /// before the newest delivered notification.
    ///
    /// Channels are not ordered against each other and publishes may be
    /// retried, so a row created before the newest delivered one can still
    /// be in flight.
    pub async fn resubscribe(&self) -> AppResult<()> {
        self.subscribe_all().await?;
        let window = chrono::Duration::from_std(self.config.replay_window)
            .unwrap_or_else(|_| chrono::Duration::zero());
        let since = self.router.latest_delivered().map(|latest| latest - window);
        self.catch_up(since).await;
        info!(device_id = %self.config.device_id, "Client resubscribed");
        Ok(())
    }

    /// Timers for shown notifications.
    pub fn dismissals(&self) -> &AutoDismissScheduler {
        &self.dismiss
    }

    /// Stop every task. Pending dismissals are dropped.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.dismiss.shutdown();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Client task ended abnormally");
            }
        }
        info!(device_id = %self.config.device_id, "Client runtime stopped");
    }

    async fn subscribe_all(&self) -> AppResult<()> {
        for channel in ChannelType::subscription_plan(self.config.module) {
            self.broker
                .subscribe(&channel.to_channel_string(), self.sink.clone())
                .await?;
        }
        Ok(())
    }

    async fn catch_up(&self, since: Option<DateTime<Utc>>) {
        let missed = match self
            .catch_up
            .missed(&self.config.device_id, self.config.module, since)
            .await
        {
            Ok(missed) => missed,
            Err(e) => {
                warn!(device_id = %self.config.device_id, error = %e, "Catch-up failed");
                return;
            }
        };

        let count = missed.len();
        for event in missed {
            self.router
                .handle(WireMessage::Notification(event), Origin::Replay)
                .await;
        }
        debug!(device_id = %self.config.device_id, count, "Catch-up replayed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bizhub_core::traits::{Clock, ManualClock};
    use bizhub_database::{NotificationStore, StoreBundle};
    use bizhub_entity::notification::{NewNotification, Notification, NotificationPriority};

    use crate::broker::MemoryBroker;
    use crate::fanout::Fanout;
    use crate::presence::PresenceRegistry;
    use crate::reconciler::CatchUpReconciler;

    struct World {
        clock: Arc<ManualClock>,
        broker: Arc<MemoryBroker>,
        fanout: Fanout,
        notifications: Arc<dyn NotificationStore>,
        presence: Arc<PresenceRegistry>,
        reconciler: Arc<CatchUpReconciler>,
    }

    fn world() -> World {
        let stores = StoreBundle::in_memory();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let broker = Arc::new(MemoryBroker::new());
        let fanout = Fanout::new(
            stores.notifications.clone(),
            stores.devices.clone(),
            broker.clone(),
            clock.clone(),
            &Default::default(),
        );
        World {
            presence: Arc::new(PresenceRegistry::new(
                stores.devices.clone(),
                clock.clone(),
                PresenceConfig::default(),
            )),
            reconciler: Arc::new(CatchUpReconciler::new(
                stores.notifications.clone(),
                stores.devices,
            )),
            notifications: stores.notifications,
            clock,
            broker,
            fanout,
        }
    }

    fn config(device_id: &str, module: ModuleType) -> ClientConfig {
        ClientConfig {
            device_id: device_id.to_string(),
            module,
            heartbeat_interval: Duration::from_secs(60),
            auto_dismiss: Duration::ZERO,
            dedup_capacity: 100,
            replay_window: Duration::from_secs(300),
        }
    }

    fn sales_note(title: &str) -> NewNotification {
        NewNotification {
            notification_type: "STOCK".to_string(),
            title: title.to_string(),
            target_module: Some(ModuleType::Sales),
            priority: NotificationPriority::Normal,
            created_by: "bob".to_string(),
            ..Default::default()
        }
    }

    async fn next_title(rx: &mut mpsc::Receiver<ClientEvent>) -> (String, Origin) {
        match rx.recv().await {
            Some(ClientEvent::Notification { event, origin }) => (event.title, origin),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_start_replays_missed_then_receives_live() {
        let w = world();
        w.presence
            .register_or_reactivate("dev-1", "alice", None, ModuleType::Sales)
            .await
            .unwrap();
        w.presence.deactivate("dev-1").await.unwrap();
        w.clock.advance(chrono::Duration::minutes(1));
        w.fanout.publish(sales_note("while away")).await.unwrap();
        w.presence
            .register_or_reactivate("dev-1", "alice", None, ModuleType::Sales)
            .await
            .unwrap();

        let (runtime, mut rx) = ClientRuntime::start(
            config("dev-1", ModuleType::Sales),
            w.broker.clone(),
            w.presence.clone(),
            w.reconciler.clone(),
        )
        .await
        .unwrap();

        assert_eq!(next_title(&mut rx).await, ("while away".to_string(), Origin::Replay));

        w.fanout.publish(sales_note("live")).await.unwrap();
        assert_eq!(next_title(&mut rx).await, ("live".to_string(), Origin::Live));

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_resubscribe_does_not_duplicate() {
        let w = world();
        w.presence
            .register_or_reactivate("dev-1", "alice", None, ModuleType::Sales)
            .await
            .unwrap();
        let (runtime, mut rx) = ClientRuntime::start(
            config("dev-1", ModuleType::Sales),
            w.broker.clone(),
            w.presence.clone(),
            w.reconciler.clone(),
        )
        .await
        .unwrap();

        w.fanout.publish(sales_note("once")).await.unwrap();
        assert_eq!(next_title(&mut rx).await.0, "once");

        runtime.resubscribe().await.unwrap();
        assert_eq!(w.broker.subscriber_count("sales_notifications").await, 1);
        assert!(rx.try_recv().is_err());

        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn test_resubscribe_recovers_row_published_out_of_order() {
        let w = world();
        w.presence
            .register_or_reactivate("dev-1", "alice", None, ModuleType::Sales)
            .await
            .unwrap();
        let (runtime, mut rx) = ClientRuntime::start(
            config("dev-1", ModuleType::Sales),
            w.broker.clone(),
            w.presence.clone(),
            w.reconciler.clone(),
        )
        .await
        .unwrap();

        // Stored but its publish never reached the broker.
        let late = Notification::new(
            sales_note("late"),
            w.clock.now() + chrono::Duration::seconds(30),
        );
        w.notifications.insert(&late).await.unwrap();

        w.clock.advance(chrono::Duration::minutes(1));
        w.fanout.publish(sales_note("fresh")).await.unwrap();
        assert_eq!(next_title(&mut rx).await, ("fresh".to_string(), Origin::Live));

        runtime.resubscribe().await.unwrap();
        assert_eq!(next_title(&mut rx).await, ("late".to_string(), Origin::Replay));
        assert!(rx.try_recv().is_err());

        runtime.shutdown().await;
    }
}
