//! Storage traits for the coordination tables.
//!
//! Services hold these as `Arc<dyn ...>` so the PostgreSQL repositories and
//! the in-memory stores are interchangeable. Every method that depends on
//! the current time takes it as an argument; no implementation reads a
//! clock of its own.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bizhub_core::result::AppResult;
use bizhub_core::types::{ApprovalId, NotificationId};
use bizhub_entity::ModuleType;
use bizhub_entity::approval::{ApprovalRequest, ApprovalStatus};
use bizhub_entity::device::{DeviceRegistration, DeviceStatus};
use bizhub_entity::notification::{Notification, NotificationAction, NotificationReceipt};

/// The terminal state written when a request leaves `Pending`.
#[derive(Debug, Clone)]
pub struct ApprovalDecision {
    /// Target status; never `Pending`.
    pub status: ApprovalStatus,
    /// Actor username, or `system` for timeouts.
    pub processed_by: String,
    /// Decision time.
    pub processed_at: DateTime<Utc>,
    /// Notes or rejection reason.
    pub processing_notes: Option<String>,
}

/// Persistence for approval requests.
#[async_trait]
pub trait ApprovalStore: Send + Sync + 'static {
    /// Insert a new request.
    async fn insert(&self, request: &ApprovalRequest) -> AppResult<ApprovalRequest>;

    /// Look up a request by id.
    async fn find_by_id(&self, id: ApprovalId) -> AppResult<Option<ApprovalRequest>>;

    /// Pending, unexpired requests for `role`, either untargeted or targeted
    /// at `user_id`. Oldest first.
    async fn find_pending_for_role(
        &self,
        role: ModuleType,
        user_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ApprovalRequest>>;

    /// Every request made by `username`, newest first.
    async fn find_by_requester(&self, username: &str) -> AppResult<Vec<ApprovalRequest>>;

    /// Pending requests whose deadline is before `now`.
    async fn find_expired_pending(&self, now: DateTime<Utc>) -> AppResult<Vec<ApprovalRequest>>;

    /// Remove a request that never became visible. Returns false when it
    /// does not exist.
    async fn delete(&self, id: ApprovalId) -> AppResult<bool>;

    /// Compare-and-set out of `Pending`. Returns `None` when the request is
    /// unknown or already terminal.
    async fn transition(
        &self,
        id: ApprovalId,
        decision: &ApprovalDecision,
    ) -> AppResult<Option<ApprovalRequest>>;
}

/// Which notifications a bulk read applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadScope {
    /// Everything addressed to one device.
    Device(String),
    /// Everything addressed to a module, including broadcasts.
    Module(ModuleType),
}

/// Persistence and queries for notifications and read receipts.
///
/// "For a module" always means rows with no device target that a client of
/// the module receives live: `target_module` null, equal to the module, or
/// any module at all for storage.
///
/// Read state is per reader. "Unread for `reader`" means the reader has no
/// receipt for the row, except that approval prompts stay unread for
/// everyone until they are resolved. A `None` reader applies no receipt
/// filter.
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Insert a new notification.
    async fn insert(&self, notification: &Notification) -> AppResult<Notification>;

    /// Look up a notification by id.
    async fn find_by_id(&self, id: NotificationId) -> AppResult<Option<Notification>>;

    /// Rows targeted at `device_id` unread for `reader`, oldest first.
    async fn unread_for_device(
        &self,
        device_id: &str,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>>;

    /// Rows for `module` unread for `reader`, oldest first.
    async fn unread_for_module(
        &self,
        module: ModuleType,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>>;

    /// All rows for `module` created strictly after `since`.
    async fn for_module_since(
        &self,
        module: ModuleType,
        since: DateTime<Utc>,
    ) -> AppResult<Vec<Notification>>;

    /// Rows for `module` created strictly after `since` and unread for
    /// `reader`.
    async fn unread_for_module_since(
        &self,
        module: ModuleType,
        since: DateTime<Utc>,
        reader: Option<&str>,
    ) -> AppResult<Vec<Notification>>;

    /// Rows with neither a device nor a module target, newest first.
    async fn broadcast(&self, limit: i64) -> AppResult<Vec<Notification>>;

    /// Unresolved rows with the given action, optionally limited to rows
    /// visible to `module`.
    async fn unresolved_by_action(
        &self,
        action: NotificationAction,
        module: Option<ModuleType>,
    ) -> AppResult<Vec<Notification>>;

    /// Number of rows targeted at `device_id` unread for `reader`.
    async fn count_unread_for_device(&self, device_id: &str, reader: &str) -> AppResult<i64>;

    /// Number of rows for `module` unread for `reader`.
    async fn count_unread_for_module(&self, module: ModuleType, reader: &str) -> AppResult<i64>;

    /// Record a receipt for `username`. Other readers are unaffected.
    /// Returns false when the notification does not exist.
    async fn mark_read(
        &self,
        id: NotificationId,
        username: &str,
        at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Record receipts for `username` on every row in `scope` it has not
    /// read yet. Returns the number of receipts written.
    async fn mark_all_read(
        &self,
        scope: &ReadScope,
        username: &str,
        at: DateTime<Utc>,
    ) -> AppResult<u64>;

    /// Set `resolved = true` on every row about the given entity.
    async fn resolve_for_entity(&self, entity_type: &str, entity_id: &str) -> AppResult<u64>;

    /// Hard-delete rows created before `before`. With `keep_unresolved`,
    /// unresolved approval prompts survive regardless of age.
    async fn delete_older_than(
        &self,
        before: DateTime<Utc>,
        keep_unresolved: bool,
    ) -> AppResult<u64>;

    /// Read receipts recorded for a notification.
    async fn receipts_for(&self, id: NotificationId) -> AppResult<Vec<NotificationReceipt>>;
}

/// Registration payload for a device.
#[derive(Debug, Clone)]
pub struct DeviceUpsert {
    /// Client-generated natural key.
    pub device_id: String,
    /// Logged-in username.
    pub username: String,
    /// Logged-in user id.
    pub user_id: Option<i64>,
    /// Module the client runs.
    pub module_type: ModuleType,
}

/// Persistence for device registrations.
#[async_trait]
pub trait DeviceStore: Send + Sync + 'static {
    /// Insert or reactivate the row for `device.device_id`, leaving it
    /// active and online with a fresh heartbeat.
    async fn upsert(&self, device: &DeviceUpsert, now: DateTime<Utc>)
    -> AppResult<DeviceRegistration>;

    /// Look up a device by its natural key.
    async fn find(&self, device_id: &str) -> AppResult<Option<DeviceRegistration>>;

    /// Refresh the heartbeat of an active device, reviving `Offline` to
    /// `Online` and leaving `Idle` alone. `None` if unknown or inactive.
    async fn touch_heartbeat(
        &self,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeviceRegistration>>;

    /// Set the status of an active device. `None` if unknown or inactive.
    async fn set_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
    ) -> AppResult<Option<DeviceRegistration>>;

    /// Active `Online`/`Idle` devices whose last heartbeat is at or before `cutoff`.
    async fn find_stale(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<DeviceRegistration>>;

    /// Mark one device offline only if it is still stale at `cutoff`.
    /// Returns false when a fresh heartbeat won the race.
    async fn mark_offline_if_stale(&self, device_id: &str, cutoff: DateTime<Utc>)
    -> AppResult<bool>;

    /// Soft-delete a device. `None` if unknown.
    async fn deactivate(
        &self,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DeviceRegistration>>;

    /// Active devices that are not offline, optionally for one module.
    async fn online(&self, module: Option<ModuleType>) -> AppResult<Vec<DeviceRegistration>>;
}
