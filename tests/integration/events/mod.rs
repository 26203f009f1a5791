//! Change feed integration tests over Server-Sent Events

use std::pin::Pin;
use std::time::Duration;

use axum::body::BodyDataStream;
use axum::http::{Method, StatusCode};
use futures_core::Stream;
use tower::ServiceExt;

use leadline_common::config::Config;

use crate::common::{json_request, TestApp, T0};

/// Next body chunk as text, `None` once the stream ends or nothing arrives in time
async fn next_chunk(stream: &mut BodyDataStream) -> Option<String> {
    let next = std::future::poll_fn(|cx| Pin::new(&mut *stream).poll_next(cx));
    match tokio::time::timeout(Duration::from_secs(2), next).await {
        Ok(Some(Ok(bytes))) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        _ => None,
    }
}

/// Read until `needle` shows up, returning everything read so far
async fn read_until(stream: &mut BodyDataStream, needle: &str) -> String {
    let mut seen = String::new();
    while !seen.contains(needle) {
        match next_chunk(stream).await {
            Some(chunk) => seen.push_str(&chunk),
            None => break,
        }
    }
    seen
}

async fn subscribe(app: &TestApp, uri: &str) -> BodyDataStream {
    let response = app
        .router()
        .oneshot(json_request(Method::GET, uri, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    response.into_body().into_data_stream()
}

#[tokio::test]
async fn test_feed_streams_filtered_events() {
    let app = TestApp::new();
    let mut stream = subscribe(&app, "/v1/events?kinds=message.created").await;

    app.inbound("15550100001", "Hello", "in-1", T0).await;

    let seen = read_until(&mut stream, "event: message.created").await;
    assert!(seen.contains("event: message.created"));
    assert!(seen.contains("\"correlation_id\":\"in-1\""));
    assert!(!seen.contains("lead.created"));
    assert!(!seen.contains("conversation.updated"));
}

#[tokio::test]
async fn test_feed_reports_status_changes() {
    let app = TestApp::new();
    app.outbound("15550100001", "Hello", "X1", T0).await;
    let mut stream = subscribe(&app, "/v1/events?kinds=message.status_changed").await;

    app.status("X1", "delivered", T0 + 10).await;

    let seen = read_until(&mut stream, "event: message.status_changed").await;
    assert!(seen.contains("\"status\":\"delivered\""));
}

#[tokio::test]
async fn test_unknown_kind_returns_400() {
    let app = TestApp::new();

    let (status, body) = app.get("/v1/events?kinds=message.deleted").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_lagging_subscriber_is_told_and_disconnected() {
    let app = TestApp::with_config(Config {
        notifier_capacity: 2,
        ..Config::in_memory()
    });
    let mut stream = subscribe(&app, "/v1/events").await;

    for i in 0..3 {
        app.inbound("15550100001", "Hello", &format!("in-{}", i), T0 + i)
            .await;
    }

    let seen = read_until(&mut stream, "event: lagged").await;
    assert!(seen.contains("event: lagged"));
    assert!(next_chunk(&mut stream).await.is_none());
}
