//! Gateway webhook integration tests: inbound ingestion and delivery-status callbacks

use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use leadline_common::config::{Config, UnknownStatusPolicy};

use crate::common::{json_request, TestApp, T0};

mod test_inbound {
    use super::*;

    #[tokio::test]
    async fn test_first_inbound_creates_lead_and_conversation() {
        let app = TestApp::new();

        let (status, body) = app
            .post(
                "/v1/webhooks/inbound",
                json!({
                    "phone": "+1 (555) 010-0001",
                    "name": "Ana",
                    "content": "Hi, is the flat still available?",
                    "correlation_id": "wamid.in.1",
                    "timestamp": T0,
                }),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["duplicate"], false);
        assert_eq!(body["lead_created"], true);
        assert_eq!(body["message"]["direction"], "inbound");
        assert_eq!(body["message"]["sender"], "lead");
        assert_eq!(body["message"]["status"], "received");
        assert_eq!(body["conversation"]["phone"], "15550100001");
        assert_eq!(body["conversation"]["channel"], "whatsapp");
        assert_eq!(body["conversation"]["message_count"], 1);

        let (status, lead) = app.get("/v1/leads/15550100001").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(lead["name"], "Ana");
        assert_eq!(lead["status"], "new");
    }

    #[tokio::test]
    async fn test_replayed_inbound_is_recorded_once() {
        let app = TestApp::new();

        let (first, _) = app.inbound("15550100001", "Hello", "Y1", T0).await;
        let (second, body) = app.inbound("15550100001", "Hello", "Y1", T0).await;

        assert_eq!(first, StatusCode::CREATED);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(body["duplicate"], true);
        assert_eq!(body["lead_created"], false);
        assert_eq!(body["conversation"]["message_count"], 1);

        let (_, history) = app.get("/v1/leads/15550100001/messages").await;
        assert_eq!(history["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_second_message_reuses_lead_and_conversation() {
        let app = TestApp::new();

        let (_, first) = app.inbound("15550100001", "One", "in-1", T0).await;
        let (status, second) = app.inbound("15550100001", "Two", "in-2", T0 + 60).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(second["lead_created"], false);
        assert_eq!(second["conversation"]["id"], first["conversation"]["id"]);
        assert_eq!(second["conversation"]["message_count"], 2);
    }

    #[tokio::test]
    async fn test_media_only_inbound_is_accepted() {
        let app = TestApp::new();

        let (status, body) = app
            .post(
                "/v1/webhooks/inbound",
                json!({
                    "phone": "15550100001",
                    "media": {"kind": "image", "media_id": "media-7", "mime_type": "image/jpeg"},
                    "correlation_id": "wamid.img",
                }),
            )
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(body["message"]["content"].is_null());
        assert_eq!(body["message"]["media"]["kind"], "image");
        assert_eq!(body["message"]["media"]["media_id"], "media-7");
    }

    #[tokio::test]
    async fn test_inbound_without_content_or_media_returns_400() {
        let app = TestApp::new();

        let (status, body) = app
            .post(
                "/v1/webhooks/inbound",
                json!({"phone": "15550100001", "content": "   "}),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, leads) = app.get("/v1/leads").await;
        assert!(leads.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_inbound_with_malformed_phone_returns_400() {
        let app = TestApp::new();

        let (status, body) = app.inbound("555-CALL-NOW", "Hello", "in-1", T0).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_inbound_with_malformed_json_returns_400() {
        let app = TestApp::new();

        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/v1/webhooks/inbound")
            .header("content-type", "application/json")
            .body(axum::body::Body::from("{\"phone\": "))
            .unwrap();
        let response = app.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_inbound_on_named_channel_opens_separate_conversation() {
        let app = TestApp::new();

        let (_, whatsapp) = app.inbound("15550100001", "Hi", "in-1", T0).await;
        let (_, sms) = app
            .post(
                "/v1/webhooks/inbound",
                json!({
                    "phone": "15550100001",
                    "content": "Hi again",
                    "channel": "SMS",
                    "correlation_id": "in-2",
                }),
            )
            .await;

        assert_eq!(sms["conversation"]["channel"], "sms");
        assert_ne!(sms["conversation"]["id"], whatsapp["conversation"]["id"]);
        assert_eq!(sms["conversation"]["lead_id"], whatsapp["conversation"]["lead_id"]);
    }
}

mod test_status {
    use super::*;

    #[tokio::test]
    async fn test_stale_status_between_forward_moves_is_ignored() {
        let app = TestApp::new();
        app.outbound("15550000", "Your viewing is confirmed", "X1", T0).await;

        let (_, delivered) = app.status("X1", "delivered", T0 + 10).await;
        let (_, stale) = app.status("X1", "sent", T0 + 5).await;
        let (status, read) = app.status("X1", "read", T0 + 20).await;

        assert_eq!(delivered["outcome"], "applied");
        assert_eq!(stale["outcome"], "stale");
        assert_eq!(stale["message"]["status"], "delivered");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(read["outcome"], "applied");
        assert_eq!(read["message"]["status"], "read");

        let (_, history) = app.get("/v1/leads/15550000/messages").await;
        assert_eq!(history["messages"][0]["status"], "read");
    }

    #[tokio::test]
    async fn test_repeated_status_is_duplicate() {
        let app = TestApp::new();
        app.outbound("15550100001", "Hello", "X1", T0).await;

        app.status("X1", "delivered", T0 + 10).await;
        let (status, body) = app.status("X1", "delivered", T0 + 10).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "duplicate");
    }

    #[tokio::test]
    async fn test_backward_status_is_regression() {
        let app = TestApp::new();
        app.outbound("15550100001", "Hello", "X1", T0).await;

        app.status("X1", "read", T0 + 10).await;
        let (_, body) = app.status("X1", "delivered", T0 + 20).await;

        assert_eq!(body["outcome"], "regressed");
        assert_eq!(body["message"]["status"], "read");
    }

    #[tokio::test]
    async fn test_seen_is_read() {
        let app = TestApp::new();
        app.outbound("15550100001", "Hello", "X1", T0).await;

        let (_, body) = app.status("X1", "seen", T0 + 10).await;

        assert_eq!(body["outcome"], "applied");
        assert_eq!(body["message"]["status"], "read");
    }

    #[tokio::test]
    async fn test_failure_records_error_detail() {
        let app = TestApp::new();
        app.outbound("15550100001", "Hello", "X1", T0).await;

        let (status, body) = app
            .post(
                "/v1/webhooks/status",
                json!({
                    "correlation_id": "X1",
                    "status": "failed",
                    "timestamp": "2023-11-14T22:15:00Z",
                    "error_code": "131026",
                    "error_message": "Message undeliverable",
                }),
            )
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "applied");
        assert_eq!(body["message"]["status"], "failed");
        assert_eq!(body["message"]["error_code"], "131026");
        assert_eq!(body["message"]["error_message"], "Message undeliverable");

        let (_, after) = app.status("X1", "delivered", T0 + 3600).await;
        assert_eq!(after["outcome"], "regressed");
    }

    #[tokio::test]
    async fn test_status_for_inbound_message_is_regression() {
        let app = TestApp::new();
        app.inbound("15550100001", "Hello", "in-1", T0).await;

        let (_, body) = app.status("in-1", "delivered", T0 + 10).await;

        assert_eq!(body["outcome"], "regressed");
        assert_eq!(body["message"]["status"], "received");
    }

    #[tokio::test]
    async fn test_unknown_correlation_is_404_under_discard() {
        let app = TestApp::new();

        let (status, body) = app.status("never-sent", "delivered", T0).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_unknown_status_string_returns_400() {
        let app = TestApp::new();
        app.outbound("15550100001", "Hello", "X1", T0).await;

        let (status, body) = app.status("X1", "bounced", T0 + 10).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_buffered_status_replays_when_message_is_recorded() {
        let app = TestApp::with_config(Config {
            unknown_status_policy: UnknownStatusPolicy::Buffer,
            ..Config::in_memory()
        });

        let (status, early) = app.status("X9", "delivered", T0 + 10).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(early["outcome"], "buffered");
        assert!(early["message"].is_null());

        let (status, recorded) = app.outbound("15550100001", "Hello", "X9", T0).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(recorded["message"]["status"], "delivered");
    }

    #[tokio::test]
    async fn test_missing_timestamp_returns_400() {
        let app = TestApp::new();

        let response = app
            .router()
            .oneshot(json_request(
                Method::POST,
                "/v1/webhooks/status",
                Some(json!({"correlation_id": "X1", "status": "read"})),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
