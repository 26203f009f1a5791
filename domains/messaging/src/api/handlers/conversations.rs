//! Conversation API handlers

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use leadline_common::{Error, Result, ValidatedJson};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::api::middleware::MessagingState;
use crate::domain::entities::{Conversation, ConversationStatus, SentimentLabel};
use crate::domain::state::ConversationEvent;

/// Conversation response DTO
#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub phone: String,
    pub channel: String,
    pub status: ConversationStatus,
    pub message_count: i32,
    pub last_message_at: Option<DateTime<Utc>>,
    pub sentiment: Option<SentimentLabel>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Conversation> for ConversationResponse {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            lead_id: c.lead_id,
            phone: c.phone,
            channel: c.channel,
            status: c.status,
            message_count: c.message_count,
            last_message_at: c.last_message_at,
            sentiment: c.sentiment,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Request for archiving or unarchiving a conversation
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateConversationRequest {
    pub status: ConversationStatus,
}

#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    pub changed: bool,
    pub conversation: ConversationResponse,
}

/// List all conversations of a phone, newest first
pub async fn list_conversations(
    State(state): State<MessagingState>,
    Path(phone): Path<String>,
) -> Result<Json<Vec<ConversationResponse>>> {
    let conversations = state.service.list_conversations(&phone).await?;
    Ok(Json(conversations.into_iter().map(Into::into).collect()))
}

pub async fn get_conversation(
    State(state): State<MessagingState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConversationResponse>> {
    let conversation = state
        .service
        .get_conversation(id)
        .await?
        .ok_or_else(|| Error::NotFound("Conversation not found".to_string()))?;

    Ok(Json(conversation.into()))
}

/// Archive or unarchive a conversation
pub async fn update_conversation(
    State(state): State<MessagingState>,
    Path(id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateConversationRequest>,
) -> Result<Json<ConversationResponse>> {
    let event = match req.status {
        ConversationStatus::Archived => ConversationEvent::Archive,
        ConversationStatus::Active => ConversationEvent::Unarchive,
    };
    let conversation = state.service.transition_conversation(id, event).await?;
    Ok(Json(conversation.into()))
}

/// Recompute message count and last activity from the ledger
pub async fn reconcile_conversation(
    State(state): State<MessagingState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ReconcileResponse>> {
    let (conversation, changed) = state.service.reconcile(id).await?;
    Ok(Json(ReconcileResponse {
        changed,
        conversation: conversation.into(),
    }))
}
