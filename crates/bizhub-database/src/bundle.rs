//! Store provider selection.

use std::sync::Arc;

use tracing::info;

use bizhub_core::config::DatabaseConfig;
use bizhub_core::error::AppError;
use bizhub_core::result::AppResult;

use crate::connection::DatabasePool;
use crate::memory::{MemoryApprovalStore, MemoryDeviceStore, MemoryNotificationStore};
use crate::repositories::{ApprovalRepository, DeviceRepository, NotificationRepository};
use crate::store::{ApprovalStore, DeviceStore, NotificationStore};

/// The three stores wired to one backend.
///
/// The backend is selected at construction time based on configuration.
#[derive(Clone)]
pub struct StoreBundle {
    /// Approval requests.
    pub approvals: Arc<dyn ApprovalStore>,
    /// Notifications and receipts.
    pub notifications: Arc<dyn NotificationStore>,
    /// Device registrations.
    pub devices: Arc<dyn DeviceStore>,
    /// The pool, when backed by PostgreSQL.
    pub pool: Option<DatabasePool>,
}

impl StoreBundle {
    /// Build the stores named by `config.provider`.
    pub async fn from_config(config: &DatabaseConfig) -> AppResult<Self> {
        match config.provider.as_str() {
            "postgres" => {
                let db = DatabasePool::connect(config).await?;
                info!("Using PostgreSQL stores");
                Ok(Self::postgres(db))
            }
            "memory" => {
                info!("Using in-memory stores");
                Ok(Self::in_memory())
            }
            other => Err(AppError::configuration(format!(
                "Unknown database provider: '{other}'. Supported: postgres, memory"
            ))),
        }
    }

    /// PostgreSQL repositories sharing one pool.
    pub fn postgres(db: DatabasePool) -> Self {
        let pool = db.pool().clone();
        Self {
            approvals: Arc::new(ApprovalRepository::new(pool.clone())),
            notifications: Arc::new(NotificationRepository::new(pool.clone())),
            devices: Arc::new(DeviceRepository::new(pool)),
            pool: Some(db),
        }
    }

    /// Fresh, empty in-process stores.
    pub fn in_memory() -> Self {
        Self {
            approvals: Arc::new(MemoryApprovalStore::new()),
            notifications: Arc::new(MemoryNotificationStore::new()),
            devices: Arc::new(MemoryDeviceStore::new()),
            pool: None,
        }
    }

    /// Check the backend is reachable.
    pub async fn health_check(&self) -> AppResult<()> {
        match &self.pool {
            Some(db) => db.ping().await,
            None => Ok(()),
        }
    }

    /// Release backend resources.
    pub async fn close(&self) {
        if let Some(db) = &self.pool {
            db.close().await;
        }
    }
}

impl std::fmt::Debug for StoreBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBundle")
            .field("postgres", &self.pool.is_some())
            .finish()
    }
}
