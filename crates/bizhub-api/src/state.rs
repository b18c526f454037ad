//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use bizhub_core::config::AppConfig;
use bizhub_core::traits::{Clock, MessageBroker};
use bizhub_database::StoreBundle;
use bizhub_realtime::{CatchUpReconciler, Fanout, PresenceRegistry};
use bizhub_service::{ApprovalWorkflow, NotificationService, PresenceService};

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped for cheap cloning across tasks.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Approval, notification and device stores
    pub stores: StoreBundle,
    /// Pub/sub broker
    pub broker: Arc<dyn MessageBroker>,
    /// Time source shared by every service
    pub clock: Arc<dyn Clock>,
    /// Persist-then-publish delivery
    pub fanout: Arc<Fanout>,
    /// Device liveness
    pub registry: Arc<PresenceRegistry>,
    /// Approval lifecycle
    pub approvals: Arc<ApprovalWorkflow>,
    /// Notification queries and publishing
    pub notifications: Arc<NotificationService>,
    /// Device registration on behalf of callers
    pub presence: Arc<PresenceService>,
    /// Process start, for the health endpoint
    pub started_at: Instant,
}

impl AppState {
    /// Wire the services on top of the given stores and broker.
    pub fn new(
        config: AppConfig,
        stores: StoreBundle,
        broker: Arc<dyn MessageBroker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fanout = Arc::new(Fanout::new(
            Arc::clone(&stores.notifications),
            Arc::clone(&stores.devices),
            Arc::clone(&broker),
            Arc::clone(&clock),
            &config.broker,
        ));
        let registry = Arc::new(PresenceRegistry::new(
            Arc::clone(&stores.devices),
            Arc::clone(&clock),
            config.presence.clone(),
        ));
        let reconciler = CatchUpReconciler::new(
            Arc::clone(&stores.notifications),
            Arc::clone(&stores.devices),
        );
        let approvals = Arc::new(ApprovalWorkflow::new(
            Arc::clone(&stores.approvals),
            Arc::clone(&fanout),
            Arc::clone(&clock),
        ));
        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&fanout),
            reconciler,
            Arc::clone(&clock),
        ));
        let presence = Arc::new(PresenceService::new(Arc::clone(&registry)));

        Self {
            config: Arc::new(config),
            stores,
            broker,
            clock,
            fanout,
            registry,
            approvals,
            notifications,
            presence,
            started_at: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("stores", &self.stores)
            .field("broker", &self.broker.provider_name())
            .field("approvals", &self.approvals)
            .finish()
    }
}
