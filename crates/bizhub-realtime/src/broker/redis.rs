//! Redis pub/sub broker.
//!
//! Publishes go through a bounded queue drained by a background task, so a
//! publish accepted during a Redis outage is delivered once the connection
//! comes back. A second task owns the subscriber connection; it reconnects
//! on a fixed interval and re-subscribes every registered channel.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use bizhub_core::config::BrokerConfig;
use bizhub_core::error::{AppError, ErrorKind};
use bizhub_core::result::AppResult;
use bizhub_core::traits::{BrokerMessage, MessageBroker};

type Subscriptions = Arc<DashMap<String, Vec<mpsc::Sender<BrokerMessage>>>>;

#[derive(Debug)]
struct OutboundPublish {
    channel: String,
    payload: String,
}

#[derive(Debug)]
enum Control {
    Subscribe(String),
    Unsubscribe(String),
}

/// Redis-backed [`MessageBroker`].
pub struct RedisBroker {
    client: redis::Client,
    prefix: String,
    reconnect_interval: Duration,
    outbound_tx: mpsc::Sender<OutboundPublish>,
    outbound_rx: Mutex<Option<mpsc::Receiver<OutboundPublish>>>,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: Mutex<Option<mpsc::UnboundedReceiver<Control>>>,
    /// Physical channel name → local sinks
    subscriptions: Subscriptions,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker")
            .field("prefix", &self.prefix)
            .field("channels", &self.subscriptions.len())
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl RedisBroker {
    /// Create a broker; nothing connects until [`MessageBroker::connect`].
    pub fn new(config: &BrokerConfig) -> AppResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, "Invalid Redis URL", e)
        })?;
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_size.max(1));
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        Ok(Self {
            client,
            prefix: config.channel_prefix.clone(),
            reconnect_interval: Duration::from_secs(config.reconnect_interval_seconds.max(1)),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            control_tx,
            control_rx: Mutex::new(Some(control_rx)),
            subscriptions: Arc::new(DashMap::new()),
            connected: Arc::new(AtomicBool::new(false)),
            shutdown: CancellationToken::new(),
        })
    }

    fn physical(&self, channel: &str) -> String {
        format!("{}{channel}", self.prefix)
    }
}

#[async_trait]
impl MessageBroker for RedisBroker {
    fn provider_name(&self) -> &str {
        "redis"
    }

    async fn connect(&self) -> AppResult<()> {
        let outbound_rx = self
            .outbound_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let control_rx = self
            .control_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        let (Some(outbound_rx), Some(control_rx)) = (outbound_rx, control_rx) else {
            debug!("Redis broker tasks already running");
            return Ok(());
        };

        tokio::spawn(run_publisher(
            self.client.clone(),
            outbound_rx,
            self.reconnect_interval,
            self.shutdown.clone(),
        ));
        tokio::spawn(run_subscriber(SubscriberTask {
            client: self.client.clone(),
            control_rx,
            subscriptions: self.subscriptions.clone(),
            prefix: self.prefix.clone(),
            interval: self.reconnect_interval,
            connected: self.connected.clone(),
            shutdown: self.shutdown.clone(),
        }));

        info!(interval = ?self.reconnect_interval, "Redis broker started");
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: &str) -> AppResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(AppError::broker_unavailable("Redis broker is closed"));
        }
        self.outbound_tx
            .try_send(OutboundPublish {
                channel: self.physical(channel),
                payload: payload.to_string(),
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    AppError::broker_unavailable("Redis outbound queue is full")
                }
                mpsc::error::TrySendError::Closed(_) => {
                    AppError::broker_unavailable("Redis publisher has stopped")
                }
            })
    }

    async fn subscribe(&self, channel: &str, sink: mpsc::Sender<BrokerMessage>) -> AppResult<()> {
        let physical = self.physical(channel);
        let is_new = {
            let mut sinks = self.subscriptions.entry(physical.clone()).or_default();
            let is_new = sinks.is_empty();
            sinks.retain(|s| !s.is_closed());
            if !sinks.iter().any(|s| s.same_channel(&sink)) {
                sinks.push(sink);
            }
            is_new
        };
        if is_new {
            self.control_tx
                .send(Control::Subscribe(physical))
                .map_err(|_| AppError::broker_unavailable("Redis subscriber has stopped"))?;
        }
        Ok(())
    }

    async fn unsubscribe(&self, channel: &str) -> AppResult<()> {
        let physical = self.physical(channel);
        if self.subscriptions.remove(&physical).is_some() {
            self.control_tx
                .send(Control::Unsubscribe(physical))
                .map_err(|_| AppError::broker_unavailable("Redis subscriber has stopped"))?;
        }
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        self.shutdown.cancel();
        self.subscriptions.clear();
        self.connected.store(false, Ordering::SeqCst);
        info!("Redis broker closed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Returns true when shutdown was requested during the wait.
async fn wait_or_shutdown(interval: Duration, shutdown: &CancellationToken) -> bool {
    tokio::select! {
        _ = shutdown.cancelled() => true,
        _ = tokio::time::sleep(interval) => false,
    }
}

async fn run_publisher(
    client: redis::Client,
    mut queue: mpsc::Receiver<OutboundPublish>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut conn: Option<ConnectionManager> = None;

    loop {
        let item = tokio::select! {
            _ = shutdown.cancelled() => break,
            item = queue.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        // Hold the item until Redis accepts it.
        loop {
            if conn.is_none() {
                match ConnectionManager::new(client.clone()).await {
                    Ok(c) => {
                        info!("Redis publisher connected");
                        conn = Some(c);
                    }
                    Err(e) => {
                        warn!(error = %e, retry_in = ?interval, "Redis publisher connect failed");
                        if wait_or_shutdown(interval, &shutdown).await {
                            return;
                        }
                        continue;
                    }
                }
            }
            let Some(current) = conn.as_mut() else {
                continue;
            };

            match redis::cmd("PUBLISH")
                .arg(&item.channel)
                .arg(&item.payload)
                .query_async::<i64>(current)
                .await
            {
                Ok(receivers) => {
                    debug!(channel = %item.channel, receivers, "Published to Redis");
                    break;
                }
                Err(e) => {
                    warn!(channel = %item.channel, error = %e, retry_in = ?interval, "Redis PUBLISH failed");
                    conn = None;
                    if wait_or_shutdown(interval, &shutdown).await {
                        return;
                    }
                }
            }
        }
    }

    debug!("Redis publisher stopped");
}

struct SubscriberTask {
    client: redis::Client,
    control_rx: mpsc::UnboundedReceiver<Control>,
    subscriptions: Subscriptions,
    prefix: String,
    interval: Duration,
    connected: Arc<AtomicBool>,
    shutdown: CancellationToken,
}

async fn run_subscriber(mut task: SubscriberTask) {
    while !task.shutdown.is_cancelled() {
        match task.client.get_async_pubsub().await {
            Ok(pubsub) => {
                let (mut sink, mut stream) = pubsub.split();
                let channels: Vec<String> =
                    task.subscriptions.iter().map(|e| e.key().clone()).collect();

                let mut resubscribed = true;
                for channel in &channels {
                    if let Err(e) = sink.subscribe(channel).await {
                        warn!(channel = %channel, error = %e, "Redis re-subscribe failed");
                        resubscribed = false;
                        break;
                    }
                }

                if resubscribed {
                    task.connected.store(true, Ordering::SeqCst);
                    info!(channels = channels.len(), "Redis subscriber connected");

                    loop {
                        tokio::select! {
                            _ = task.shutdown.cancelled() => {
                                task.connected.store(false, Ordering::SeqCst);
                                return;
                            }
                            command = task.control_rx.recv() => {
                                let result = match command {
                                    Some(Control::Subscribe(channel)) => sink.subscribe(channel).await,
                                    Some(Control::Unsubscribe(channel)) => sink.unsubscribe(channel).await,
                                    None => return,
                                };
                                if let Err(e) = result {
                                    warn!(error = %e, "Redis subscription change failed");
                                    break;
                                }
                            }
                            message = stream.next() => match message {
                                Some(message) => deliver(&task.subscriptions, &task.prefix, message).await,
                                None => {
                                    warn!("Redis subscriber connection lost");
                                    break;
                                }
                            },
                        }
                    }
                }
                task.connected.store(false, Ordering::SeqCst);
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?task.interval, "Redis subscriber connect failed");
            }
        }

        if wait_or_shutdown(task.interval, &task.shutdown).await {
            break;
        }
    }

    debug!("Redis subscriber stopped");
}

async fn deliver(subscriptions: &Subscriptions, prefix: &str, message: redis::Msg) {
    let physical = message.get_channel_name().to_string();
    let payload: String = match message.get_payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!(channel = %physical, error = %e, "Dropping non-text Redis payload");
            return;
        }
    };

    let sinks = subscriptions
        .get(&physical)
        .map(|entry| entry.value().clone())
        .unwrap_or_default();
    let logical = physical.strip_prefix(prefix).unwrap_or(&physical).to_string();

    for sink in sinks {
        let delivered = sink
            .send(BrokerMessage {
                channel: logical.clone(),
                payload: payload.clone(),
            })
            .await;
        if delivered.is_err() {
            debug!(channel = %logical, "Subscriber sink closed");
        }
    }
}
