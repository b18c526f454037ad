//! Integration tests for device presence.

mod helpers;

use chrono::Duration;

use bizhub_core::error::ErrorKind;
use bizhub_entity::ModuleType;
use bizhub_entity::device::DeviceStatus;

use helpers::{ALICE_SALES, BOB_STORAGE, TestApp, t0};

#[tokio::test]
async fn test_missed_heartbeats_mark_device_offline_and_keep_row() {
    let app = TestApp::new();
    let presence = &app.state.presence;
    let registry = &app.state.registry;
    let alice = ALICE_SALES.context();

    presence.register(&alice, "dev-alice", None).await.unwrap();
    app.clock.advance(Duration::seconds(60));
    presence.heartbeat(&alice, "dev-alice").await.unwrap();
    app.clock.advance(Duration::seconds(60));
    presence.heartbeat(&alice, "dev-alice").await.unwrap();

    app.clock.set(t0() + Duration::seconds(300));
    let report = registry
        .stale_sweep(Duration::seconds(180))
        .await
        .unwrap();
    assert_eq!(report.marked_offline, 1);

    let device = registry.find("dev-alice").await.unwrap().unwrap();
    assert_eq!(device.status, DeviceStatus::Offline);
    assert_eq!(device.last_heartbeat, t0() + Duration::seconds(120));
    assert!(presence.online(Some(ModuleType::Sales)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recent_heartbeat_survives_sweep() {
    let app = TestApp::new();
    let alice = ALICE_SALES.context();
    app.state.presence.register(&alice, "dev-alice", None).await.unwrap();

    app.clock.advance(Duration::seconds(179));
    let report = app
        .state
        .registry
        .stale_sweep(app.state.registry.stale_threshold())
        .await
        .unwrap();
    assert_eq!(report.marked_offline, 0);
    assert_eq!(app.state.presence.online(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_heartbeat_revives_offline_device() {
    let app = TestApp::new();
    let alice = ALICE_SALES.context();
    app.state.presence.register(&alice, "dev-alice", None).await.unwrap();

    app.clock.advance(Duration::minutes(10));
    app.state
        .registry
        .stale_sweep(Duration::seconds(180))
        .await
        .unwrap();

    let revived = app.state.presence.heartbeat(&alice, "dev-alice").await.unwrap();
    assert_eq!(revived.status, DeviceStatus::Online);
}

#[tokio::test]
async fn test_deactivated_device_rejects_heartbeat() {
    let app = TestApp::new();
    let alice = ALICE_SALES.context();
    app.state.presence.register(&alice, "dev-alice", None).await.unwrap();
    let device = app.state.presence.deactivate(&alice, "dev-alice").await.unwrap();
    assert!(!device.active);
    assert_eq!(device.last_seen, Some(t0()));

    let err = app
        .state
        .presence
        .heartbeat(&alice, "dev-alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_online_list_is_scoped_by_module() {
    let app = TestApp::new();
    app.state
        .presence
        .register(&ALICE_SALES.context(), "dev-alice", None)
        .await
        .unwrap();
    app.state
        .presence
        .register(&BOB_STORAGE.context(), "dev-bob", None)
        .await
        .unwrap();
    app.state
        .presence
        .set_idle(&BOB_STORAGE.context(), "dev-bob")
        .await
        .unwrap();

    let sales = app.state.presence.online(Some(ModuleType::Sales)).await.unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].device_id, "dev-alice");
    assert_eq!(app.state.presence.online(None).await.unwrap().len(), 2);
}
