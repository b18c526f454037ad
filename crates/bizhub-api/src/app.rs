//! Application builder: wires router, middleware and state into an Axum app.

use axum::Router;
use axum::middleware as axum_middleware;
use tower_http::trace::TraceLayer;

use crate::middleware::cors::build_cors_layer;
use crate::middleware::logging::request_logging;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server);

    build_router(state)
        .layer(axum_middleware::from_fn(request_logging))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use bizhub_core::config::AppConfig;
    use bizhub_core::traits::SystemClock;
    use bizhub_database::StoreBundle;
    use bizhub_realtime::broker::MemoryBroker;

    use super::*;

    fn app() -> Router {
        build_app(AppState::new(
            AppConfig::default(),
            StoreBundle::in_memory(),
            Arc::new(MemoryBroker::new()),
            Arc::new(SystemClock),
        ))
    }

    #[tokio::test]
    async fn test_missing_identity_is_forbidden() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/api/notifications")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unknown_role_is_bad_request() {
        let res = app()
            .oneshot(
                Request::builder()
                    .uri("/api/approvals/mine")
                    .header("x-username", "alice")
                    .header("x-role", "warehouse")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
