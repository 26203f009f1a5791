//! Analytics and AI enrichment integration tests

use axum::http::StatusCode;
use serde_json::json;

use leadline_common::config::Config;
use leadline_llm::mock::MockReply;

use crate::common::{TestApp, T0};

fn sentiment_reply(label: &str, confidence: f64) -> MockReply {
    MockReply::Text(json!({"sentiment": label, "confidence": confidence}).to_string())
}

fn with_ai(sentiment: bool, auto_reply: bool) -> TestApp {
    TestApp::with_config(Config {
        ai_sentiment_enabled: sentiment,
        ai_auto_reply_enabled: auto_reply,
        ai_timeout_ms: 500,
        ..Config::in_memory()
    })
}

mod test_stats {
    use super::*;

    async fn seed(app: &TestApp) {
        app.inbound("15550100001", "Is it available?", "in-1", T0).await;
        app.outbound("15550100001", "Yes", "X1", T0 + 10).await;
        app.outbound("15550100001", "Viewing at 10?", "X2", T0 + 20).await;
        app.outbound("15550100001", "See you then", "X3", T0 + 30).await;
        app.status("X1", "delivered", T0 + 40).await;
        app.status("X2", "read", T0 + 50).await;
    }

    #[tokio::test]
    async fn test_stats_for_phone() {
        let app = TestApp::new();
        seed(&app).await;

        let (status, body) = app.get("/v1/analytics/stats?phone=15550100001").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phone"], "15550100001");
        assert_eq!(body["total_messages"], 4);
        assert_eq!(body["sent_count"], 3);
        assert_eq!(body["received_count"], 1);
        assert_eq!(body["delivered_count"], 2);
        assert_eq!(body["read_count"], 1);
        assert_eq!(body["failed_count"], 0);
        assert_eq!(body["delivery_rate_percent"], 66.67);
        assert_eq!(body["read_rate_percent"], 33.33);
        assert_eq!(body["last_activity"], "2023-11-14T22:13:50Z");
    }

    #[tokio::test]
    async fn test_stats_without_outbound_has_null_rates() {
        let app = TestApp::new();
        app.inbound("15550100001", "Hello", "in-1", T0).await;

        let (_, body) = app.get("/v1/analytics/stats?phone=15550100001").await;

        assert_eq!(body["sent_count"], 0);
        assert!(body["delivery_rate_percent"].is_null());
        assert!(body["read_rate_percent"].is_null());
    }

    #[tokio::test]
    async fn test_stats_for_unknown_phone_is_zeroed() {
        let app = TestApp::new();

        let (status, body) = app.get("/v1/analytics/stats?phone=15559999999").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_messages"], 0);
        assert!(body["delivery_rate_percent"].is_null());
        assert!(body["last_activity"].is_null());
    }

    #[tokio::test]
    async fn test_stats_across_all_phones() {
        let app = TestApp::new();
        seed(&app).await;
        app.outbound("15550100002", "Hello", "Y1", T0).await;
        app.status("Y1", "failed", T0 + 5).await;

        let (status, body) = app.get("/v1/analytics/stats").await;

        assert_eq!(status, StatusCode::OK);
        let leads = body["leads"].as_array().unwrap();
        assert_eq!(leads.len(), 2);
        assert_eq!(leads[0]["phone"], "15550100001");
        assert_eq!(leads[1]["phone"], "15550100002");
        assert_eq!(leads[1]["failed_count"], 1);
        assert_eq!(leads[1]["delivery_rate_percent"], 0.0);

        let overall = &body["overall"];
        assert!(overall.get("phone").is_none());
        assert_eq!(overall["total_messages"], 5);
        assert_eq!(overall["sent_count"], 4);
        assert_eq!(overall["delivered_count"], 2);
        assert_eq!(overall["delivery_rate_percent"], 50.0);
        assert_eq!(overall["read_rate_percent"], 25.0);
    }
}

mod test_sentiment {
    use super::*;

    const PHONE: &str = "15550100001";
    const SENTIMENT_URI: &str = "/v1/leads/15550100001/sentiment";

    async fn wait_for_sample_size(app: &TestApp, n: u64) -> serde_json::Value {
        app.wait_for(SENTIMENT_URI, |body| body["sample_size"] == n).await
    }

    #[tokio::test]
    async fn test_inbound_messages_are_classified_and_rolled_up() {
        let app = with_ai(true, false);
        app.llm.push_reply(sentiment_reply("negative", 0.8));
        app.llm.push_reply(sentiment_reply("negative", 0.7));
        app.llm.push_reply(sentiment_reply("positive", 0.9));

        app.inbound(PHONE, "This is taking forever", "in-1", T0).await;
        wait_for_sample_size(&app, 1).await;
        app.inbound(PHONE, "Still waiting", "in-2", T0 + 10).await;
        wait_for_sample_size(&app, 2).await;
        let (status, _) = app.inbound(PHONE, "Great, thanks!", "in-3", T0 + 20).await;
        assert_eq!(status, StatusCode::CREATED);
        let summary = wait_for_sample_size(&app, 3).await;

        assert_eq!(summary["counts"]["negative"], 2);
        assert_eq!(summary["counts"]["positive"], 1);
        assert_eq!(summary["overall"], "negative");
        assert_eq!(summary["most_recent"], "positive");
        assert_eq!(summary["trend"], "stable");

        let (_, history) = app.get("/v1/leads/15550100001/messages").await;
        assert_eq!(history["messages"][0]["sentiment"], "positive");
        assert_eq!(history["messages"][0]["sentiment_confidence"], 0.9);
        assert_eq!(history["messages"][2]["sentiment"], "negative");

        let (_, conversations) = app.get("/v1/leads/15550100001/conversations").await;
        assert_eq!(conversations[0]["sentiment"], "positive");
    }

    #[tokio::test]
    async fn test_ingest_responds_before_classification() {
        let app = TestApp::with_config(Config {
            ai_sentiment_enabled: true,
            ai_auto_reply_enabled: true,
            ai_timeout_ms: 5_000,
            ..Config::in_memory()
        });
        app.llm.push_reply(MockReply::Hang);

        let started = std::time::Instant::now();
        let (status, body) = app.inbound(PHONE, "Hello?", "in-1", T0).await;

        assert_eq!(status, StatusCode::CREATED);
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert!(body["message"]["sentiment"].is_null());
        assert_eq!(body["conversation"]["message_count"], 1);
    }

    #[tokio::test]
    async fn test_classifier_failure_does_not_block_ingest() {
        let app = with_ai(true, false);
        app.llm
            .push_reply(MockReply::Fail("model overloaded".to_string()));

        let (status, body) = app.inbound(PHONE, "Hello", "in-1", T0).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["conversation"]["message_count"], 1);

        app.wait_until("classifier call", || app.llm.recorded_requests().len() == 1)
            .await;
        let (_, summary) = app.get(SENTIMENT_URI).await;
        assert_eq!(summary["sample_size"], 0);
        let (_, history) = app.get("/v1/leads/15550100001/messages").await;
        assert!(history["messages"][0]["sentiment"].is_null());
    }

    #[tokio::test]
    async fn test_summary_without_records_is_neutral() {
        let app = TestApp::new();
        app.inbound(PHONE, "Hello", "in-1", T0).await;

        let (_, summary) = app.get(SENTIMENT_URI).await;

        assert_eq!(summary["sample_size"], 0);
        assert_eq!(summary["overall"], "neutral");
        assert!(summary["most_recent"].is_null());
        assert_eq!(summary["trend"], "stable");
    }

    #[tokio::test]
    async fn test_disabled_enrichment_never_calls_model() {
        let app = TestApp::new();

        app.inbound(PHONE, "Hello", "in-1", T0).await;

        assert!(app.llm.recorded_requests().is_empty());
    }
}

mod test_auto_reply {
    use super::*;

    const HISTORY_URI: &str = "/v1/leads/15550100001/messages";

    #[tokio::test]
    async fn test_inbound_triggers_system_reply_through_gateway() {
        let app = with_ai(false, true);
        app.llm
            .push_reply(MockReply::Text("Thanks! An agent will call you shortly.".to_string()));
        app.gateway.behavior().push_correlation_id("wamid.auto.1");

        let (status, _) = app.inbound("15550100001", "Can someone call me?", "in-1", T0).await;
        assert_eq!(status, StatusCode::CREATED);

        let history = app
            .wait_for(HISTORY_URI, |body| {
                body["messages"][0]["correlation_id"] == "wamid.auto.1"
            })
            .await;
        let reply = &history["messages"][0];
        assert_eq!(reply["sender"], "system");
        assert_eq!(reply["direction"], "outbound");
        assert_eq!(history["messages"][1]["sender"], "lead");

        let requests = app.gateway.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(
            requests[0].content.as_deref(),
            Some("Thanks! An agent will call you shortly.")
        );
    }

    #[tokio::test]
    async fn test_reply_failure_keeps_inbound_message() {
        let app = with_ai(false, true);
        app.llm.push_reply(MockReply::Fail("unavailable".to_string()));

        let (status, _) = app.inbound("15550100001", "Hello?", "in-1", T0).await;
        assert_eq!(status, StatusCode::CREATED);

        app.wait_until("reply drafting", || app.llm.recorded_requests().len() == 1)
            .await;
        assert!(app.gateway.recorded_requests().is_empty());
        let (_, history) = app.get(HISTORY_URI).await;
        assert_eq!(history["messages"].as_array().unwrap().len(), 1);
    }
}
