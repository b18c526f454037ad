//! Integration tests for the HTTP surface.

mod helpers;

use axum::http::StatusCode;
use chrono::Duration;
use serde_json::json;

use helpers::{ALICE_SALES, BOB_STORAGE, CAROL_SALES, DAVE_PRICING, TestApp};

async fn create_request(app: &TestApp) -> String {
    let response = app
        .request(
            "POST",
            "/api/approvals",
            Some(json!({
                "request_type": "ADD_ELEMENT",
                "approver_role": "SALES",
                "project_id": 7,
                "item_id": 99,
                "quantity": 5
            })),
            Some(&BOB_STORAGE),
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["data"]["status"], "pending");
    response.body["data"]["id"]
        .as_str()
        .expect("approval id")
        .to_string()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app.request("GET", "/api/health", None, None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["data"]["broker"], "memory");
}

#[tokio::test]
async fn test_approval_decisions_map_to_status_codes() {
    let app = TestApp::new();
    let id = create_request(&app).await;

    let pending = app
        .request("GET", "/api/approvals/pending", None, Some(&CAROL_SALES))
        .await;
    assert_eq!(pending.status, StatusCode::OK);
    assert_eq!(pending.body["data"].as_array().map(Vec::len), Some(1));

    let forbidden = app
        .request(
            "POST",
            &format!("/api/approvals/{id}/approve"),
            Some(json!({})),
            Some(&DAVE_PRICING),
        )
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);

    let approved = app
        .request(
            "POST",
            &format!("/api/approvals/{id}/approve"),
            Some(json!({ "notes": "fine" })),
            Some(&ALICE_SALES),
        )
        .await;
    assert_eq!(approved.status, StatusCode::OK);
    assert_eq!(approved.body["data"]["status"], "approved");
    assert_eq!(approved.body["data"]["processed_by"], "alice");

    let conflict = app
        .request(
            "POST",
            &format!("/api/approvals/{id}/reject"),
            Some(json!({})),
            Some(&CAROL_SALES),
        )
        .await;
    assert_eq!(conflict.status, StatusCode::CONFLICT);
    assert_eq!(conflict.body["error"], "ALREADY_PROCESSED");

    let mine = app
        .request("GET", "/api/approvals/mine", None, Some(&BOB_STORAGE))
        .await;
    assert_eq!(mine.body["data"][0]["id"], id.as_str());
}

#[tokio::test]
async fn test_expired_decision_is_gone() {
    let app = TestApp::new();
    let id = create_request(&app).await;
    app.clock.advance(Duration::hours(49));

    let response = app
        .request(
            "POST",
            &format!("/api/approvals/{id}/approve"),
            Some(json!({})),
            Some(&ALICE_SALES),
        )
        .await;
    assert_eq!(response.status, StatusCode::GONE);

    let current = app
        .request("GET", &format!("/api/approvals/{id}"), None, Some(&ALICE_SALES))
        .await;
    assert_eq!(current.body["data"]["status"], "timeout");
}

#[tokio::test]
async fn test_unknown_approval_is_not_found() {
    let app = TestApp::new();
    let response = app
        .request(
            "GET",
            "/api/approvals/6f1c2a0e-0000-4000-8000-000000000000",
            None,
            Some(&ALICE_SALES),
        )
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_publish_and_read_notifications() {
    let app = TestApp::new();
    let published = app
        .request(
            "POST",
            "/api/notifications",
            Some(json!({
                "type": "STOCK",
                "title": "Restocked",
                "message": "Item 99 is back",
                "target_module": "ALL"
            })),
            Some(&BOB_STORAGE),
        )
        .await;
    assert_eq!(published.status, StatusCode::OK);
    assert_eq!(published.body["data"]["created_by"], "bob");
    let id = published.body["data"]["id"].as_str().unwrap().to_string();

    let count = app
        .request("GET", "/api/notifications/unread-count", None, Some(&ALICE_SALES))
        .await;
    assert_eq!(count.body["data"]["module"], 1);

    let broadcast = app
        .request("GET", "/api/notifications/broadcast", None, Some(&ALICE_SALES))
        .await;
    assert_eq!(broadcast.body["data"][0]["id"], id.as_str());

    let read = app
        .request(
            "PUT",
            &format!("/api/notifications/{id}/read"),
            None,
            Some(&ALICE_SALES),
        )
        .await;
    assert_eq!(read.status, StatusCode::OK);

    let count = app
        .request("GET", "/api/notifications/unread-count", None, Some(&ALICE_SALES))
        .await;
    assert_eq!(count.body["data"]["total"], 0);
}

#[tokio::test]
async fn test_publish_rejects_empty_title() {
    let app = TestApp::new();
    let response = app
        .request(
            "POST",
            "/api/notifications",
            Some(json!({ "type": "STOCK", "title": "" })),
            Some(&BOB_STORAGE),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["success"], false);
}

#[tokio::test]
async fn test_presence_round_trip() {
    let app = TestApp::new();
    let registered = app
        .request(
            "POST",
            "/api/presence/register",
            Some(json!({ "device_id": "dev-alice" })),
            Some(&ALICE_SALES),
        )
        .await;
    assert_eq!(registered.status, StatusCode::OK);
    assert_eq!(registered.body["data"]["module_type"], "sales");
    assert_eq!(registered.body["data"]["status"], "online");

    let heartbeat = app
        .request("POST", "/api/presence/heartbeat", Some(json!({})), Some(&ALICE_SALES))
        .await;
    assert_eq!(heartbeat.status, StatusCode::OK);

    let online = app
        .request("GET", "/api/presence/online?module=sales", None, Some(&ALICE_SALES))
        .await;
    assert_eq!(online.body["data"].as_array().map(Vec::len), Some(1));

    let stolen = app
        .request(
            "POST",
            "/api/presence/deactivate",
            Some(json!({ "device_id": "dev-alice" })),
            Some(&BOB_STORAGE),
        )
        .await;
    assert_eq!(stolen.status, StatusCode::FORBIDDEN);

    let missed = app
        .request("GET", "/api/notifications/missed", None, Some(&ALICE_SALES))
        .await;
    assert_eq!(missed.status, StatusCode::OK);
}
