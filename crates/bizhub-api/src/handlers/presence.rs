//! Presence handlers.

use axum::Json;
use axum::extract::{Query, State};

use bizhub_entity::device::DeviceRegistration;

use crate::dto::request::{DeviceRequest, OnlineQuery, RegisterDeviceRequest, validated};
use crate::extractors::Actor;
use crate::handlers::{ApiResult, ok};
use crate::state::AppState;

/// POST /api/presence/register
pub async fn register(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<RegisterDeviceRequest>,
) -> ApiResult<DeviceRegistration> {
    let req = validated(req)?;
    let module = req.module()?;
    ok(state.presence.register(&actor, &req.device_id, module).await?)
}

/// POST /api/presence/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<DeviceRequest>,
) -> ApiResult<DeviceRegistration> {
    let device_id = req.resolve(&actor)?;
    ok(state.presence.heartbeat(&actor, &device_id).await?)
}

/// POST /api/presence/idle
pub async fn idle(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<DeviceRequest>,
) -> ApiResult<DeviceRegistration> {
    let device_id = req.resolve(&actor)?;
    ok(state.presence.set_idle(&actor, &device_id).await?)
}

/// POST /api/presence/deactivate
pub async fn deactivate(
    State(state): State<AppState>,
    actor: Actor,
    Json(req): Json<DeviceRequest>,
) -> ApiResult<DeviceRegistration> {
    let device_id = req.resolve(&actor)?;
    ok(state.presence.deactivate(&actor, &device_id).await?)
}

/// GET /api/presence/online
pub async fn online(
    State(state): State<AppState>,
    _actor: Actor,
    Query(query): Query<OnlineQuery>,
) -> ApiResult<Vec<DeviceRegistration>> {
    let module = query.module()?;
    ok(state.presence.online(module).await?)
}
