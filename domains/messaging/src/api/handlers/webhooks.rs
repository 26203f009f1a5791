//! Gateway webhook handlers: inbound messages and delivery-status callbacks
//!
//! Gateways retry deliveries, so both endpoints are idempotent. A replayed inbound message
//! answers 200 with `duplicate: true`; a replayed status reports `duplicate` as its outcome.

use axum::{extract::State, http::StatusCode, Json};
use leadline_common::{Result, ValidatedJson};
use leadline_gateway::{GatewayTimestamp, StatusCallback};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::messages::{parse_timestamp, IngestResponse, MessageResponse};
use crate::api::middleware::MessagingState;
use crate::domain::entities::MediaDescriptor;
use crate::domain::state::StatusOutcome;
use crate::service::{status_event_from_callback, InboundMessage};

/// Inbound message webhook payload
#[derive(Debug, Deserialize, Validate)]
pub struct InboundWebhookRequest {
    #[validate(length(min = 7, max = 32))]
    pub phone: String,
    /// Sender profile name
    #[validate(length(max = 255))]
    pub name: Option<String>,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    #[validate(length(max = 255))]
    pub correlation_id: Option<String>,
    pub channel: Option<String>,
    pub timestamp: Option<GatewayTimestamp>,
}

/// Delivery-status webhook payload
#[derive(Debug, Deserialize, Validate)]
pub struct StatusWebhookRequest {
    #[validate(length(min = 1, max = 255))]
    pub correlation_id: String,
    #[validate(length(min = 1, max = 32))]
    pub status: String,
    pub timestamp: GatewayTimestamp,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl From<StatusWebhookRequest> for StatusCallback {
    fn from(req: StatusWebhookRequest) -> Self {
        Self {
            correlation_id: req.correlation_id,
            status: req.status,
            timestamp: req.timestamp,
            error_code: req.error_code,
            error_message: req.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusWebhookResponse {
    pub outcome: StatusOutcome,
    pub message: Option<MessageResponse>,
}

/// Ingest an inbound message
pub async fn inbound(
    State(state): State<MessagingState>,
    ValidatedJson(req): ValidatedJson<InboundWebhookRequest>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let outcome = state
        .service
        .ingest_inbound(InboundMessage {
            phone: req.phone,
            name: req.name,
            channel: req.channel,
            content: req.content,
            media: req.media,
            correlation_id: req.correlation_id,
            timestamp: parse_timestamp(req.timestamp)?,
        })
        .await?;

    Ok(IngestResponse::with_status(outcome))
}

/// Apply a delivery-status callback
pub async fn status(
    State(state): State<MessagingState>,
    ValidatedJson(req): ValidatedJson<StatusWebhookRequest>,
) -> Result<Json<StatusWebhookResponse>> {
    let event = status_event_from_callback(req.into())?;
    let report = state.service.apply_status(event).await?;

    Ok(Json(StatusWebhookResponse {
        outcome: report.outcome,
        message: report.message.map(Into::into),
    }))
}
