//! Integration tests for publishing, catch-up and read state.

mod helpers;

use chrono::Duration;

use bizhub_database::store::ReadScope;
use bizhub_entity::ModuleType;
use bizhub_entity::notification::NewNotification;

use helpers::{ALICE_SALES, BOB_STORAGE, CAROL_SALES, DAVE_PRICING, TestApp, t0};

fn stock_event(target: Option<ModuleType>) -> NewNotification {
    NewNotification {
        notification_type: "STOCK".to_string(),
        title: "Stock level changed".to_string(),
        message: "Item 99 is below its reorder point".to_string(),
        target_module: target,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_untargeted_event_reaches_broadcast_and_every_module() {
    let app = TestApp::new();
    let svc = &app.state.notifications;

    app.clock.advance(Duration::minutes(1));
    let everyone = svc
        .publish(&BOB_STORAGE.context(), stock_event(None))
        .await
        .unwrap();

    let broadcast = svc.broadcast(50).await.unwrap();
    assert!(broadcast.iter().any(|n| n.id == everyone.id));

    for module in ModuleType::ALL {
        let missed = svc.missed_since(None, None, Some(module), Some(t0())).await.unwrap();
        assert!(
            missed.iter().any(|n| n.id == everyone.id),
            "missing for {module}"
        );
    }
}

#[tokio::test]
async fn test_missed_since_is_exclusive_and_scoped() {
    let app = TestApp::new();
    let svc = &app.state.notifications;
    let bob = BOB_STORAGE.context();

    let at_t = svc.publish(&bob, stock_event(Some(ModuleType::Sales))).await.unwrap();
    app.clock.advance(Duration::seconds(1));
    let after = svc.publish(&bob, stock_event(Some(ModuleType::Sales))).await.unwrap();
    let other = svc.publish(&bob, stock_event(Some(ModuleType::Pricing))).await.unwrap();

    let missed = svc
        .missed_since(None, None, Some(ModuleType::Sales), Some(at_t.created_at))
        .await
        .unwrap();
    let ids: Vec<_> = missed.iter().map(|n| n.id).collect();

    assert_eq!(ids, vec![after.id]);
    assert!(!ids.contains(&other.id));
}

#[tokio::test]
async fn test_offline_device_catches_up_on_direct_message() {
    let app = TestApp::new();
    let alice = ALICE_SALES.context();
    app.state
        .presence
        .register(&alice, "dev-alice", None)
        .await
        .unwrap();
    app.state
        .presence
        .deactivate(&alice, "dev-alice")
        .await
        .unwrap();

    app.clock.advance(Duration::minutes(5));
    let direct = app
        .state
        .notifications
        .publish(
            &BOB_STORAGE.context(),
            NewNotification {
                target_device_id: Some("dev-alice".to_string()),
                ..stock_event(None)
            },
        )
        .await
        .unwrap();

    app.state
        .presence
        .register(&alice, "dev-alice", None)
        .await
        .unwrap();
    let missed = app
        .state
        .notifications
        .missed_since(None, Some("dev-alice"), None, Some(t0()))
        .await
        .unwrap();
    assert!(missed.iter().any(|n| n.id == direct.id));
}

#[tokio::test]
async fn test_read_state_is_per_reader() {
    let app = TestApp::new();
    let svc = &app.state.notifications;
    let bob = BOB_STORAGE.context();
    let alice = ALICE_SALES.context();
    let carol = CAROL_SALES.context();

    let first = svc.publish(&bob, stock_event(Some(ModuleType::Sales))).await.unwrap();
    svc.publish(&bob, stock_event(Some(ModuleType::Sales))).await.unwrap();
    assert_eq!(svc.unread_count(&alice, None, None).await.unwrap().module, 2);

    svc.mark_read(&alice, first.id).await.unwrap();
    assert_eq!(svc.unread_count(&alice, None, None).await.unwrap().module, 1);
    assert_eq!(svc.unread_count(&carol, None, None).await.unwrap().module, 2);

    let marked = svc
        .mark_all_read(&alice, ReadScope::Module(ModuleType::Sales))
        .await
        .unwrap();
    assert_eq!(marked, 1);
    assert!(svc.list_unread(&alice, None, None).await.unwrap().is_empty());
    assert_eq!(svc.list_unread(&carol, None, None).await.unwrap().len(), 2);

    let receipts = svc.receipts(first.id).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].username, "alice");
}

#[tokio::test]
async fn test_reading_a_broadcast_keeps_it_missed_for_other_modules() {
    let app = TestApp::new();
    let svc = &app.state.notifications;
    let alice = ALICE_SALES.context();
    let dave = DAVE_PRICING.context();

    app.clock.advance(Duration::minutes(1));
    let everyone = svc
        .publish(&BOB_STORAGE.context(), stock_event(None))
        .await
        .unwrap();
    svc.mark_all_read(&alice, ReadScope::Module(ModuleType::Sales))
        .await
        .unwrap();

    let for_alice = svc
        .missed_since(Some("alice"), None, Some(ModuleType::Sales), Some(t0()))
        .await
        .unwrap();
    assert!(for_alice.iter().all(|n| n.id != everyone.id));

    let for_dave = svc
        .missed_since(Some("dave"), None, Some(ModuleType::Pricing), Some(t0()))
        .await
        .unwrap();
    assert!(for_dave.iter().any(|n| n.id == everyone.id));
    assert_eq!(svc.unread_count(&dave, None, None).await.unwrap().module, 1);
}

#[tokio::test]
async fn test_broker_outage_keeps_committed_row() {
    let app = TestApp::new();
    app.broker.set_connected(false);

    let kept = app
        .state
        .notifications
        .publish(&BOB_STORAGE.context(), stock_event(Some(ModuleType::Sales)))
        .await
        .unwrap();

    let unread = app
        .state
        .notifications
        .list_unread(&ALICE_SALES.context(), None, None)
        .await
        .unwrap();
    assert!(unread.iter().any(|n| n.id == kept.id));
}
