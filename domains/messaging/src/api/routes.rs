//! Route definitions for Messaging domain API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{analytics, conversations, events, leads, messages, webhooks};
use super::middleware::MessagingState;

/// Create all Messaging domain API routes
pub fn routes() -> Router<MessagingState> {
    Router::new()
        .route("/v1/webhooks/inbound", post(webhooks::inbound))
        .route("/v1/webhooks/status", post(webhooks::status))
        .route("/v1/messages", post(messages::record_outbound))
        .route("/v1/messages/send", post(messages::send_message))
        .route("/v1/leads", get(leads::list_leads))
        .route(
            "/v1/leads/{phone}",
            get(leads::get_lead)
                .patch(leads::update_lead)
                .delete(leads::delete_lead),
        )
        .route("/v1/leads/{phone}/messages", get(messages::history))
        .route(
            "/v1/leads/{phone}/conversations",
            get(conversations::list_conversations),
        )
        .route("/v1/leads/{phone}/sentiment", get(analytics::sentiment_summary))
        .route(
            "/v1/conversations/{id}",
            get(conversations::get_conversation).patch(conversations::update_conversation),
        )
        .route(
            "/v1/conversations/{id}/reconcile",
            post(conversations::reconcile_conversation),
        )
        .route("/v1/analytics/stats", get(analytics::stats))
        .route("/v1/events", get(events::stream_events))
}
