//! Integration tests for the approval lifecycle.

mod helpers;

use chrono::Duration;

use bizhub_core::error::ErrorKind;
use bizhub_database::store::NotificationStore;
use bizhub_entity::ModuleType;
use bizhub_entity::approval::ApprovalStatus;
use bizhub_entity::notification::NotificationAction;
use bizhub_service::CreateApproval;

use helpers::{ALICE_SALES, BOB_STORAGE, CAROL_SALES, DAVE_PRICING, TestApp, t0};

fn add_element(quantity: i32) -> CreateApproval {
    CreateApproval {
        request_type: "ADD_ELEMENT".to_string(),
        approver_role: ModuleType::Sales,
        target_approver_id: None,
        project_id: Some(7),
        item_id: Some(99),
        quantity,
        notes: None,
    }
}

#[tokio::test]
async fn test_approve_then_second_decision_is_already_processed() {
    let app = TestApp::new();
    let approvals = &app.state.approvals;

    let request = approvals
        .create(&BOB_STORAGE.context(), add_element(5))
        .await
        .unwrap();
    assert_eq!(request.status, ApprovalStatus::Pending);
    assert_eq!(request.created_at, t0());
    assert_eq!(request.expires_at, t0() + Duration::days(2));

    app.clock.advance(Duration::hours(1));
    let approved = approvals
        .approve(&ALICE_SALES.context(), request.id, Some("ok".to_string()))
        .await
        .unwrap();
    assert_eq!(approved.status, ApprovalStatus::Approved);
    assert_eq!(approved.processed_by.as_deref(), Some("alice"));
    assert_eq!(approved.processed_at, Some(t0() + Duration::hours(1)));

    let err = approvals
        .approve(&CAROL_SALES.context(), request.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyProcessed);
    let err = approvals
        .reject(&CAROL_SALES.context(), request.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyProcessed);
}

#[tokio::test]
async fn test_concurrent_approve_and_reject_have_one_winner() {
    let app = TestApp::new();
    let approvals = &app.state.approvals;
    let request = approvals
        .create(&BOB_STORAGE.context(), add_element(1))
        .await
        .unwrap();

    let alice = ALICE_SALES.context();
    let carol = CAROL_SALES.context();
    let (a, b) = tokio::join!(
        approvals.approve(&alice, request.id, None),
        approvals.reject(&carol, request.id, Some("no".to_string())),
    );

    assert!(a.is_ok() != b.is_ok());
    let loser = a.err().or(b.err()).unwrap();
    assert_eq!(loser.kind, ErrorKind::AlreadyProcessed);
}

#[tokio::test]
async fn test_sweep_times_out_and_notifies_requester() {
    let app = TestApp::new();
    let approvals = &app.state.approvals;
    let request = approvals
        .create(&BOB_STORAGE.context(), add_element(5))
        .await
        .unwrap();

    app.clock.advance(Duration::hours(49));
    let report = approvals.expire_overdue().await.unwrap();
    assert_eq!(report.examined, 1);
    assert_eq!(report.timed_out, 1);

    let current = approvals.get(request.id).await.unwrap();
    assert_eq!(current.status, ApprovalStatus::Timeout);

    let to_storage = app
        .state
        .stores
        .notifications
        .for_module_since(ModuleType::Storage, t0())
        .await
        .unwrap();
    assert!(
        to_storage
            .iter()
            .any(|n| n.action == NotificationAction::ApprovalTimedOut)
    );

    let again = approvals.expire_overdue().await.unwrap();
    assert_eq!(again.timed_out, 0);
}

#[tokio::test]
async fn test_deciding_after_expiry_forces_timeout() {
    let app = TestApp::new();
    let approvals = &app.state.approvals;
    let request = approvals
        .create(&BOB_STORAGE.context(), add_element(5))
        .await
        .unwrap();

    app.clock.advance(Duration::hours(49));
    let err = approvals
        .approve(&ALICE_SALES.context(), request.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Expired);
    assert_eq!(
        approvals.get(request.id).await.unwrap().status,
        ApprovalStatus::Timeout
    );
}

#[tokio::test]
async fn test_prompt_visible_to_all_approvers_until_decided() {
    let app = TestApp::new();
    let notifications = &app.state.notifications;
    let approvals = &app.state.approvals;
    let request = approvals
        .create(&BOB_STORAGE.context(), add_element(5))
        .await
        .unwrap();

    let open = notifications.open_prompts(Some(ModuleType::Sales)).await.unwrap();
    assert_eq!(open.len(), 1);
    assert!(
        notifications
            .open_prompts(Some(ModuleType::Pricing))
            .await
            .unwrap()
            .is_empty()
    );

    for who in [ALICE_SALES, CAROL_SALES] {
        let pending = approvals
            .list_pending_for_role(&who.context(), ModuleType::Sales)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1, "{}", who.username);
    }
    let missed = notifications
        .missed_since(None, None, Some(ModuleType::Sales), Some(t0() - Duration::days(7)))
        .await
        .unwrap();
    assert!(missed.iter().any(|n| n.id == open[0].id));

    let err = approvals
        .approve(&DAVE_PRICING.context(), request.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authorization);

    approvals
        .approve(&CAROL_SALES.context(), request.id, None)
        .await
        .unwrap();

    assert!(
        notifications
            .open_prompts(Some(ModuleType::Sales))
            .await
            .unwrap()
            .is_empty()
    );
    let missed = notifications
        .missed_since(None, None, Some(ModuleType::Sales), Some(t0() - Duration::days(7)))
        .await
        .unwrap();
    assert!(missed.iter().all(|n| n.id != open[0].id));
}

#[tokio::test]
async fn test_prompt_stays_unread_for_other_approvers_after_a_read() {
    let app = TestApp::new();
    let notifications = &app.state.notifications;
    let request = app
        .state
        .approvals
        .create(&BOB_STORAGE.context(), add_element(2))
        .await
        .unwrap();
    let alice = ALICE_SALES.context();
    let carol = CAROL_SALES.context();

    let prompt = notifications.open_prompts(Some(ModuleType::Sales)).await.unwrap()[0].clone();
    for who in [&alice, &carol] {
        let unread = notifications.list_unread(who, None, None).await.unwrap();
        assert!(unread.iter().any(|n| n.id == prompt.id), "{}", who.username);
    }

    notifications.mark_read(&alice, prompt.id).await.unwrap();
    for who in [&alice, &carol] {
        let unread = notifications.list_unread(who, None, None).await.unwrap();
        assert!(unread.iter().any(|n| n.id == prompt.id), "{}", who.username);
        assert_eq!(notifications.unread_count(who, None, None).await.unwrap().module, 1);
    }

    app.state
        .approvals
        .reject(&carol, request.id, Some("out of stock".to_string()))
        .await
        .unwrap();
    for who in [&alice, &carol] {
        let unread = notifications.list_unread(who, None, None).await.unwrap();
        assert!(unread.iter().all(|n| n.id != prompt.id), "{}", who.username);
    }
}
