//! Notification handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use uuid::Uuid;

use bizhub_core::types::NotificationId;
use bizhub_entity::notification::{Notification, NotificationReceipt};
use bizhub_service::UnreadCount;

use crate::dto::request::{
    BroadcastQuery, MissedQuery, NotificationQuery, PublishNotificationRequest, ReadAllRequest,
    validated,
};
use crate::dto::response::{MarkedResponse, MessageResponse};
use crate::extractors::Actor;
use crate::handlers::{ApiResult, ok};
use crate::state::AppState;

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<Notification>> {
    let module = query.module()?;
    let items = state
        .notifications
        .list_unread(&actor, query.device_id.as_deref(), module)
        .await?;
    ok(items)
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<UnreadCount> {
    let module = query.module()?;
    let count = state
        .notifications
        .unread_count(&actor, query.device_id.as_deref(), module)
        .await?;
    ok(count)
}

/// PUT /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<MessageResponse> {
    state
        .notifications
        .mark_read(&actor, NotificationId::from_uuid(id))
        .await?;
    ok(MessageResponse::new("Marked as read"))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    actor: Actor,
    Query(req): Query<ReadAllRequest>,
) -> ApiResult<MarkedResponse> {
    let scope = req.scope(&actor)?;
    let marked = state.notifications.mark_all_read(&actor, scope).await?;
    ok(MarkedResponse { marked })
}

/// GET /api/notifications/missed
pub async fn missed(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<MissedQuery>,
) -> ApiResult<Vec<Notification>> {
    let module = query.module()?;
    let device_id = query.device_id.as_deref().or(actor.device_id.as_deref());
    let module = module.or_else(|| device_id.is_none().then_some(actor.role));
    let items = state
        .notifications
        .missed_since(Some(actor.username.as_str()), device_id, module, query.since)
        .await?;
    ok(items)
}

/// GET /api/notifications/broadcast
pub async fn broadcast(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<BroadcastQuery>,
) -> ApiResult<Vec<Notification>> {
    ok(state.notifications.broadcast(query.limit).await?)
}

/// GET /api/notifications/{id}/receipts
pub async fn receipts(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<NotificationReceipt>> {
    ok(state
        .notifications
        .receipts(NotificationId::from_uuid(id))
        .await?)
}

/// POST /api/notifications
pub async fn publish(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<PublishNotificationRequest>,
) -> ApiResult<Notification> {
    let input = validated(req)?.into_new()?;
    ok(state.notifications.publish(&actor, input).await?)
}
