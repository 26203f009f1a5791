//! Ledger invariants under concurrent webhook traffic

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::common::{json_request, TestApp, T0};

async fn post_json(router: axum::Router, uri: &'static str, body: serde_json::Value) -> StatusCode {
    router
        .oneshot(json_request(Method::POST, uri, Some(body)))
        .await
        .unwrap()
        .status()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_contact_creates_one_lead() {
    let app = TestApp::new();

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let router = app.router();
            tokio::spawn(post_json(
                router,
                "/v1/webhooks/inbound",
                json!({
                    "phone": "15550100001",
                    "content": format!("message {}", i),
                    "correlation_id": format!("in-{}", i),
                    "timestamp": T0 + i,
                }),
            ))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::CREATED);
    }

    let (_, leads) = app.get("/v1/leads").await;
    assert_eq!(leads.as_array().unwrap().len(), 1);

    let (_, conversations) = app.get("/v1/leads/15550100001/conversations").await;
    let conversations = conversations.as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["message_count"], 20);
    assert_eq!(conversations[0]["last_message_at"], "2023-11-14T22:13:39Z");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_replays_record_one_message() {
    let app = TestApp::new();

    let handles: Vec<_> = (0..10)
        .map(|_| {
            tokio::spawn(post_json(
                app.router(),
                "/v1/webhooks/inbound",
                json!({
                    "phone": "15550100001",
                    "content": "Hello",
                    "correlation_id": "Y1",
                    "timestamp": T0,
                }),
            ))
        })
        .collect();

    let mut created = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            StatusCode::CREATED => created += 1,
            StatusCode::OK => duplicates += 1,
            other => panic!("unexpected status {}", other),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(duplicates, 9);

    let (_, history) = app.get("/v1/leads/15550100001/messages").await;
    assert_eq!(history["messages"].as_array().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_status_events_converge_to_latest_forward_status() {
    let app = TestApp::new();
    app.outbound("15550100001", "Hello", "X1", T0).await;

    let events = [
        ("sent", T0 + 1),
        ("delivered", T0 + 10),
        ("read", T0 + 20),
        ("delivered", T0 + 10),
        ("sent", T0 + 5),
    ];
    let handles: Vec<_> = events
        .iter()
        .map(|(status, ts)| {
            tokio::spawn(post_json(
                app.router(),
                "/v1/webhooks/status",
                json!({"correlation_id": "X1", "status": status, "timestamp": ts}),
            ))
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let (_, history) = app.get("/v1/leads/15550100001/messages").await;
    assert_eq!(history["messages"][0]["status"], "read");
    assert_eq!(history["messages"][0]["status_at"], "2023-11-14T22:13:40Z");
}

#[tokio::test]
async fn test_failed_is_not_applied_after_read() {
    let app = TestApp::new();
    app.outbound("15550100001", "Hello", "X1", T0).await;

    app.status("X1", "read", T0 + 20).await;
    let (_, late_failure) = app.status("X1", "failed", T0 + 30).await;

    assert_eq!(late_failure["outcome"], "regressed");
    assert_eq!(late_failure["message"]["status"], "read");
}

#[tokio::test]
async fn test_counters_match_ledger_after_mixed_traffic() {
    let app = TestApp::new();
    app.inbound("15550100001", "One", "in-1", T0 + 30).await;
    app.outbound("15550100001", "Two", "X1", T0).await;
    app.inbound("15550100001", "One", "in-1", T0 + 30).await;
    app.outbound("15550100001", "Three", "X2", T0 + 10).await;

    let (_, conversations) = app.get("/v1/leads/15550100001/conversations").await;
    let conversation = &conversations[0];
    assert_eq!(conversation["message_count"], 3);
    // Out-of-order arrival keeps the latest creation time
    assert_eq!(conversation["last_message_at"], "2023-11-14T22:13:50Z");

    let (_, reconciled) = app
        .post(
            &format!(
                "/v1/conversations/{}/reconcile",
                conversation["id"].as_str().unwrap()
            ),
            json!({}),
        )
        .await;
    assert_eq!(reconciled["changed"], false);
}
