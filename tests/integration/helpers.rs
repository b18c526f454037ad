//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;
use tower::ServiceExt;

use bizhub_api::AppState;
use bizhub_core::config::AppConfig;
use bizhub_core::traits::ManualClock;
use bizhub_database::StoreBundle;
use bizhub_entity::ModuleType;
use bizhub_realtime::broker::MemoryBroker;
use bizhub_service::RequestContext;

/// A fixed starting instant so scenarios read in offsets from it.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
}

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Wired services
    pub state: AppState,
    /// Controllable time
    pub clock: Arc<ManualClock>,
    /// In-process broker
    pub broker: Arc<MemoryBroker>,
}

impl TestApp {
    /// Create a new test application on in-memory stores
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.database.provider = "memory".to_string();
        config.broker.publish_backoff_ms = 1;

        let clock = Arc::new(ManualClock::new(t0()));
        let broker = Arc::new(MemoryBroker::new());
        let state = AppState::new(
            config,
            StoreBundle::in_memory(),
            broker.clone(),
            clock.clone(),
        );
        let router = bizhub_api::build_app(state.clone());

        Self {
            router,
            state,
            clock,
            broker,
        }
    }

    /// Make a request as `who`
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        who: Option<&Identity>,
    ) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");

        if let Some(who) = who {
            req = req
                .header("x-username", who.username)
                .header("x-role", who.role)
                .header("x-user-id", who.user_id.to_string());
            if let Some(device) = who.device {
                req = req.header("x-device-id", device);
            }
        }

        let req = req
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Gateway identity headers for a request
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub username: &'static str,
    pub user_id: i64,
    pub role: &'static str,
    pub device: Option<&'static str>,
}

impl Identity {
    /// Service-level context for the same identity
    pub fn context(&self) -> RequestContext {
        let role: ModuleType = self.role.parse().expect("valid role");
        let ctx = RequestContext::new(self.username, Some(self.user_id), role);
        match self.device {
            Some(device) => ctx.with_device(device),
            None => ctx,
        }
    }
}

pub const BOB_STORAGE: Identity = Identity {
    username: "bob",
    user_id: 2,
    role: "STORAGE",
    device: Some("dev-bob"),
};

pub const ALICE_SALES: Identity = Identity {
    username: "alice",
    user_id: 1,
    role: "SALES",
    device: Some("dev-alice"),
};

pub const CAROL_SALES: Identity = Identity {
    username: "carol",
    user_id: 3,
    role: "SALES",
    device: Some("dev-carol"),
};

pub const DAVE_PRICING: Identity = Identity {
    username: "dave",
    user_id: 4,
    role: "PRICING",
    device: None,
};

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}
