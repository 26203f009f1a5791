//! Message API handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use leadline_common::{CursorPagination, Error, Result, ValidatedJson};
use leadline_gateway::{GatewayTimestamp, TemplateRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::handlers::conversations::ConversationResponse;
use crate::api::middleware::MessagingState;
use crate::domain::entities::{
    DeliveryStatus, Direction, MediaDescriptor, Message, SenderRole, SentimentLabel,
};
use crate::repository::AppendOutcome;
use crate::service::{OutboundMessage, SendMessage};

/// Message response DTO
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub lead_id: Uuid,
    pub direction: Direction,
    pub sender: SenderRole,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub correlation_id: Option<String>,
    pub status: DeliveryStatus,
    pub status_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub sentiment: Option<SentimentLabel>,
    pub sentiment_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            lead_id: m.lead_id,
            direction: m.direction,
            sender: m.sender,
            content: m.content,
            media: m.media.map(|j| j.0),
            correlation_id: m.correlation_id,
            status: m.status,
            status_at: m.status_at,
            error_code: m.error_code,
            error_message: m.error_message,
            sentiment: m.sentiment,
            sentiment_confidence: m.sentiment_confidence,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Response for ingest endpoints
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// The correlation id was already recorded and nothing was written
    pub duplicate: bool,
    pub lead_created: bool,
    pub message: MessageResponse,
    pub conversation: ConversationResponse,
}

impl IngestResponse {
    /// 201 for a new record, 200 for a duplicate
    pub fn with_status(outcome: AppendOutcome) -> (StatusCode, Json<Self>) {
        let status = if outcome.duplicate {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        let body = Self {
            duplicate: outcome.duplicate,
            lead_created: outcome.lead_created,
            message: outcome.message.into(),
            conversation: outcome.conversation.into(),
        };
        (status, Json(body))
    }
}

/// Convert an optional gateway-style timestamp
pub(crate) fn parse_timestamp(raw: Option<GatewayTimestamp>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|t| {
        t.to_datetime()
            .ok_or_else(|| Error::Validation("Invalid timestamp".to_string()))
    })
    .transpose()
}

/// Request for recording an outbound message sent elsewhere
#[derive(Debug, Deserialize, Validate)]
pub struct RecordOutboundRequest {
    #[validate(length(min = 7, max = 32))]
    pub phone: String,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    #[validate(length(max = 255))]
    pub correlation_id: Option<String>,
    pub sender: Option<SenderRole>,
    pub channel: Option<String>,
    pub timestamp: Option<GatewayTimestamp>,
}

/// Request for sending a message through the gateway
#[derive(Debug, Deserialize, Validate)]
pub struct SendMessageRequest {
    #[validate(length(min = 7, max = 32))]
    pub phone: String,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub template: Option<TemplateRef>,
    pub channel: Option<String>,
}

/// History page response
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageResponse>,
    pub next_cursor: Option<String>,
}

/// Record an outbound message
pub async fn record_outbound(
    State(state): State<MessagingState>,
    ValidatedJson(req): ValidatedJson<RecordOutboundRequest>,
) -> Result<(StatusCode, Json<IngestResponse>)> {
    let outcome = state
        .service
        .record_outbound(OutboundMessage {
            phone: req.phone,
            channel: req.channel,
            sender: req.sender.unwrap_or(SenderRole::Agent),
            content: req.content,
            media: req.media,
            correlation_id: req.correlation_id,
            timestamp: parse_timestamp(req.timestamp)?,
        })
        .await?;

    Ok(IngestResponse::with_status(outcome))
}

/// Send a message through the delivery gateway
pub async fn send_message(
    State(state): State<MessagingState>,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let message = state
        .service
        .send(SendMessage {
            phone: req.phone,
            channel: req.channel,
            sender: SenderRole::Agent,
            content: req.content,
            media: req.media,
            template: req.template,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message.into())))
}

/// Message history for a phone, newest first
pub async fn history(
    State(state): State<MessagingState>,
    Path(phone): Path<String>,
    Query(page): Query<CursorPagination>,
) -> Result<Json<HistoryResponse>> {
    let page = state
        .service
        .history(&phone, page.limit(), page.cursor())
        .await?;

    Ok(Json(HistoryResponse {
        messages: page.messages.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor,
    }))
}
