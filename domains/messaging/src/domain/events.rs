//! Change events published after every committed mutation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use leadline_common::{Error, Result};

use super::entities::{Conversation, Lead, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "lead.created")]
    LeadCreated,
    #[serde(rename = "lead.updated")]
    LeadUpdated,
    #[serde(rename = "message.created")]
    MessageCreated,
    #[serde(rename = "message.status_changed")]
    MessageStatusChanged,
    #[serde(rename = "conversation.updated")]
    ConversationUpdated,
}

impl EventKind {
    pub const ALL: [EventKind; 5] = [
        EventKind::LeadCreated,
        EventKind::LeadUpdated,
        EventKind::MessageCreated,
        EventKind::MessageStatusChanged,
        EventKind::ConversationUpdated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::LeadCreated => "lead.created",
            EventKind::LeadUpdated => "lead.updated",
            EventKind::MessageCreated => "message.created",
            EventKind::MessageStatusChanged => "message.status_changed",
            EventKind::ConversationUpdated => "conversation.updated",
        }
    }

    /// Parse a comma-separated kind filter such as `message.created,lead.created`
    pub fn parse_list(raw: &str) -> Result<Vec<EventKind>> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(EventKind::from_str)
            .collect()
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| Error::Validation(format!("Unknown event kind: {}", s)))
    }
}

/// Full current state of the changed entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventPayload {
    Lead(Lead),
    Message(Message),
    Conversation(Conversation),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub occurred_at: DateTime<Utc>,
    pub payload: EventPayload,
}

impl ChangeEvent {
    fn new(kind: EventKind, payload: EventPayload) -> Self {
        ChangeEvent {
            id: Uuid::new_v4(),
            kind,
            occurred_at: Utc::now(),
            payload,
        }
    }

    pub fn lead_created(lead: &Lead) -> Self {
        Self::new(EventKind::LeadCreated, EventPayload::Lead(lead.clone()))
    }

    pub fn lead_updated(lead: &Lead) -> Self {
        Self::new(EventKind::LeadUpdated, EventPayload::Lead(lead.clone()))
    }

    pub fn message_created(message: &Message) -> Self {
        Self::new(EventKind::MessageCreated, EventPayload::Message(message.clone()))
    }

    pub fn message_status_changed(message: &Message) -> Self {
        Self::new(
            EventKind::MessageStatusChanged,
            EventPayload::Message(message.clone()),
        )
    }

    pub fn conversation_updated(conversation: &Conversation) -> Self {
        Self::new(
            EventKind::ConversationUpdated,
            EventPayload::Conversation(conversation.clone()),
        )
    }
}
