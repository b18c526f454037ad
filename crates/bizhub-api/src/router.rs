//! Route definitions for the BizHub HTTP API.
//!
//! All routes are organized by domain and mounted under `/api`.

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::handlers;
use crate::state::AppState;

/// Build the API router without outer layers.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(notification_routes())
        .merge(approval_routes())
        .merge(presence_routes())
        .route("/health", get(handlers::health::health));

    Router::new().nest("/api", api_routes).with_state(state)
}

/// Notification queries, read state and publishing
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(handlers::notification::list_notifications).post(handlers::notification::publish),
        )
        .route(
            "/notifications/unread-count",
            get(handlers::notification::unread_count),
        )
        .route("/notifications/read-all", put(handlers::notification::mark_all_read))
        .route("/notifications/missed", get(handlers::notification::missed))
        .route("/notifications/broadcast", get(handlers::notification::broadcast))
        .route("/notifications/{id}/read", put(handlers::notification::mark_read))
        .route(
            "/notifications/{id}/receipts",
            get(handlers::notification::receipts),
        )
}

/// Approval lifecycle
fn approval_routes() -> Router<AppState> {
    Router::new()
        .route("/approvals", post(handlers::approval::create))
        .route("/approvals/pending", get(handlers::approval::pending))
        .route("/approvals/mine", get(handlers::approval::mine))
        .route("/approvals/{id}", get(handlers::approval::get))
        .route("/approvals/{id}/approve", post(handlers::approval::approve))
        .route("/approvals/{id}/reject", post(handlers::approval::reject))
}

/// Device presence
fn presence_routes() -> Router<AppState> {
    Router::new()
        .route("/presence/register", post(handlers::presence::register))
        .route("/presence/heartbeat", post(handlers::presence::heartbeat))
        .route("/presence/idle", post(handlers::presence::idle))
        .route("/presence/deactivate", post(handlers::presence::deactivate))
        .route("/presence/online", get(handlers::presence::online))
}
