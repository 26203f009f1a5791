//! Domain entities for the Messaging domain
//!
//! Leads own conversations, conversations own messages. Every enum here is closed and maps
//! one-to-one onto a Postgres enum type.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::str::FromStr;
use uuid::Uuid;

use leadline_common::{Error, Result};
pub use leadline_gateway::MediaKind;

use super::state::{
    ConversationEvent, ConversationStateMachine, DeliveryStateMachine, StatusDecision,
};

lazy_static! {
    /// Normalized phone: 7 to 15 digits (E.164 without the plus)
    static ref PHONE_REGEX: Regex = Regex::new(r"^[0-9]{7,15}$").unwrap();
}

/// Maximum channel name length (varchar(50))
const MAX_CHANNEL_LENGTH: usize = 50;

/// Maximum text content length
pub const MAX_CONTENT_LENGTH: usize = 4096;

/// Strip formatting from a phone number and validate what is left.
///
/// `+1 (555) 123-4567` becomes `15551234567`.
pub fn normalize_phone(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let without_plus = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: String = without_plus
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    if !PHONE_REGEX.is_match(&digits) {
        return Err(Error::Validation(format!(
            "Invalid phone number '{}': expected 7 to 15 digits",
            raw
        )));
    }
    Ok(digits)
}

/// Validate a channel name, falling back to `default` when absent
pub fn normalize_channel(raw: Option<&str>, default: &str) -> Result<String> {
    let channel = raw
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(default)
        .to_ascii_lowercase();

    if channel.is_empty() {
        return Err(Error::Validation("Channel cannot be empty".to_string()));
    }
    if channel.len() > MAX_CHANNEL_LENGTH {
        return Err(Error::Validation(format!(
            "Channel must be at most {} characters",
            MAX_CHANNEL_LENGTH
        )));
    }
    Ok(channel)
}

/// Lead lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "lead_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    #[serde(rename = "follow-up")]
    #[sqlx(rename = "follow-up")]
    FollowUp,
    Won,
    Lost,
    Unqualified,
}

impl std::fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeadStatus::New => write!(f, "new"),
            LeadStatus::Contacted => write!(f, "contacted"),
            LeadStatus::FollowUp => write!(f, "follow-up"),
            LeadStatus::Won => write!(f, "won"),
            LeadStatus::Lost => write!(f, "lost"),
            LeadStatus::Unqualified => write!(f, "unqualified"),
        }
    }
}

/// Conversation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "conversation_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    #[default]
    Active,
    Archived,
}

impl std::fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Message direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "message_direction", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    /// Status a message starts in when first recorded
    pub fn initial_status(&self) -> DeliveryStatus {
        match self {
            Direction::Inbound => DeliveryStatus::Received,
            Direction::Outbound => DeliveryStatus::Sent,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Inbound => write!(f, "inbound"),
            Direction::Outbound => write!(f, "outbound"),
        }
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sender_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Lead,
    Agent,
    System,
}

impl std::fmt::Display for SenderRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SenderRole::Lead => write!(f, "lead"),
            SenderRole::Agent => write!(f, "agent"),
            SenderRole::System => write!(f, "system"),
        }
    }
}

/// Delivery status of a message.
///
/// `Received` marks inbound messages and never changes. Outbound messages move
/// `Sent -> Delivered -> Read`, with `Failed` reachable from `Sent` or `Delivered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Received,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Received => write!(f, "received"),
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Read => write!(f, "read"),
            DeliveryStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "received" => Ok(DeliveryStatus::Received),
            "sent" => Ok(DeliveryStatus::Sent),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "read" | "seen" => Ok(DeliveryStatus::Read),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(Error::Validation(format!(
                "Unknown delivery status: {}",
                other
            ))),
        }
    }
}

/// Sentiment label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "sentiment_label", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl SentimentLabel {
    pub const ALL: [SentimentLabel; 4] = [
        SentimentLabel::Positive,
        SentimentLabel::Negative,
        SentimentLabel::Neutral,
        SentimentLabel::Mixed,
    ];
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SentimentLabel::Positive => write!(f, "positive"),
            SentimentLabel::Negative => write!(f, "negative"),
            SentimentLabel::Neutral => write!(f, "neutral"),
            SentimentLabel::Mixed => write!(f, "mixed"),
        }
    }
}

impl FromStr for SentimentLabel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(SentimentLabel::Positive),
            "negative" => Ok(SentimentLabel::Negative),
            "neutral" => Ok(SentimentLabel::Neutral),
            "mixed" => Ok(SentimentLabel::Mixed),
            other => Err(Error::Validation(format!(
                "Unknown sentiment label: {}",
                other
            ))),
        }
    }
}

/// Media attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

impl MediaDescriptor {
    pub fn validate(&self) -> Result<()> {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        if blank(&self.url) && blank(&self.media_id) {
            return Err(Error::Validation(
                "Media requires a url or a media_id".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lead entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: LeadStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// A lead seen for the first time. `phone` must already be normalized.
    pub fn new(phone: String, name: Option<String>) -> Self {
        let now = now_micros();
        Lead {
            id: Uuid::new_v4(),
            phone,
            name: name.filter(|n| !n.trim().is_empty()),
            email: None,
            status: LeadStatus::default(),
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update for a lead; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub status: Option<LeadStatus>,
    pub notes: Option<String>,
}

impl LeadUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.status.is_none() && self.notes.is_none()
    }

    /// Apply onto an existing lead, bumping `updated_at`
    pub fn apply(&self, lead: &mut Lead) {
        if let Some(name) = &self.name {
            lead.name = Some(name.clone());
        }
        if let Some(email) = &self.email {
            lead.email = Some(email.clone());
        }
        if let Some(status) = self.status {
            lead.status = status;
        }
        if let Some(notes) = &self.notes {
            lead.notes = Some(notes.clone());
        }
        lead.updated_at = now_micros();
    }
}

/// Conversation entity: one thread per (lead, channel) while active
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub phone: String,
    pub channel: String,
    pub status: ConversationStatus,
    pub message_count: i32,
    pub last_message_at: Option<DateTime<Utc>>,
    pub sentiment: Option<SentimentLabel>,
    /// Creation time of the message whose sentiment is rolled up
    pub sentiment_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(lead: &Lead, channel: String) -> Self {
        let now = now_micros();
        Conversation {
            id: Uuid::new_v4(),
            lead_id: lead.id,
            phone: lead.phone.clone(),
            channel,
            status: ConversationStatus::default(),
            message_count: 0,
            last_message_at: None,
            sentiment: None,
            sentiment_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a newly appended message into the summary fields
    pub fn record_message(&mut self, message: &Message) -> Result<()> {
        self.message_count = self
            .message_count
            .checked_add(1)
            .ok_or_else(|| Error::Validation("Message count overflow".to_string()))?;
        self.last_message_at = Some(match self.last_message_at {
            Some(last) if last > message.created_at => last,
            _ => message.created_at,
        });
        if let Some(label) = message.sentiment {
            self.roll_up_sentiment(label, message.created_at);
        }
        self.updated_at = now_micros();
        Ok(())
    }

    /// Take `label` as the conversation sentiment unless a later message's label is already
    /// rolled up. Returns whether it was taken.
    pub fn roll_up_sentiment(&mut self, label: SentimentLabel, message_at: DateTime<Utc>) -> bool {
        if self.sentiment_at.is_some_and(|at| at > message_at) {
            return false;
        }
        self.sentiment = Some(label);
        self.sentiment_at = Some(message_at);
        true
    }

    /// Archive or unarchive. `other_active` says whether another conversation on the same
    /// (lead, channel) is active, which blocks unarchiving.
    pub fn apply_event(&mut self, event: ConversationEvent, other_active: bool) -> Result<()> {
        let next = ConversationStateMachine::transition(self.status, event)?;
        if next == ConversationStatus::Active && other_active {
            return Err(Error::Conflict(format!(
                "Lead {} already has an active conversation on {}",
                self.phone, self.channel
            )));
        }
        self.status = next;
        self.updated_at = now_micros();
        Ok(())
    }

    /// Replace summary counters with values recomputed from the ledger. Returns whether
    /// anything changed.
    pub fn reconcile_with(&mut self, count: i64, last: Option<DateTime<Utc>>) -> Result<bool> {
        let count = i32::try_from(count)
            .map_err(|_| Error::Internal("Message count out of range".to_string()))?;
        if self.message_count == count && self.last_message_at == last {
            return Ok(false);
        }
        self.message_count = count;
        self.last_message_at = last;
        self.updated_at = now_micros();
        Ok(true)
    }
}

/// Message entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub lead_id: Uuid,
    pub direction: Direction,
    pub sender: SenderRole,
    pub content: Option<String>,
    pub media: Option<Json<MediaDescriptor>>,
    pub correlation_id: Option<String>,
    pub status: DeliveryStatus,
    /// Gateway time of the recorded status, unset until the gateway reports one
    pub status_at: Option<DateTime<Utc>>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub sentiment: Option<SentimentLabel>,
    pub sentiment_confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Message {
    /// Materialize a validated `NewMessage` inside a conversation
    pub fn from_new(new: &NewMessage, conversation: &Conversation) -> Self {
        Message {
            id: Uuid::new_v4(),
            conversation_id: conversation.id,
            lead_id: conversation.lead_id,
            direction: new.direction,
            sender: new.sender,
            content: new.content.clone(),
            media: new.media.clone().map(Json),
            correlation_id: new.correlation_id.clone(),
            status: new.direction.initial_status(),
            status_at: None,
            error_code: None,
            error_message: None,
            sentiment: new.sentiment.map(|(label, _)| label),
            sentiment_confidence: new.sentiment.map(|(_, confidence)| confidence),
            created_at: new.created_at,
            updated_at: now_micros(),
        }
    }

    /// Text used for enrichment and reply context
    pub fn text(&self) -> Option<&str> {
        self.content
            .as_deref()
            .or_else(|| self.media.as_ref().and_then(|m| m.caption.as_deref()))
            .filter(|t| !t.trim().is_empty())
    }

    /// Run a status event through the state machine, writing it only when it moves forward
    pub fn apply_status(&mut self, event: &StatusEvent) -> StatusDecision {
        let decision =
            DeliveryStateMachine::evaluate(self.status, self.status_at, event.status, event.event_at);
        if decision == StatusDecision::Apply {
            self.status = event.status;
            self.status_at = Some(event.event_at);
            self.error_code = event.error_code.clone();
            self.error_message = event.error_message.clone();
            self.updated_at = now_micros();
        }
        decision
    }

    /// Mark as failed now, after the gateway refused or never answered
    pub fn mark_failed(&mut self, error_code: Option<&str>, error_message: &str) -> Result<()> {
        self.status = DeliveryStateMachine::transition(self.status, DeliveryStatus::Failed)?;
        let now = now_micros();
        self.status_at = Some(self.status_at.map_or(now, |at| at.max(now)));
        self.error_code = error_code.map(str::to_string);
        self.error_message = Some(error_message.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Attach the gateway correlation id. Returns false when it was already set to `id`.
    pub fn assign_correlation(&mut self, id: &str) -> Result<bool> {
        if self.direction != Direction::Outbound {
            return Err(Error::Validation(
                "Only outbound messages take a gateway correlation id".to_string(),
            ));
        }
        match self.correlation_id.as_deref() {
            Some(existing) if existing == id => Ok(false),
            Some(existing) => Err(Error::Conflict(format!(
                "Message {} already has correlation id {}",
                self.id, existing
            ))),
            None => {
                self.correlation_id = Some(id.to_string());
                self.updated_at = now_micros();
                Ok(true)
            }
        }
    }

    pub fn set_sentiment(&mut self, label: SentimentLabel, confidence: f64) {
        self.sentiment = Some(label);
        self.sentiment_confidence = Some(confidence);
        self.updated_at = now_micros();
    }
}

/// An inbound or outbound event headed for the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    /// Normalized phone
    pub phone: String,
    /// Display name from the sender profile, used only when the lead is created
    pub name: Option<String>,
    pub channel: String,
    pub direction: Direction,
    pub sender: SenderRole,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub correlation_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sentiment: Option<(SentimentLabel, f64)>,
}

impl NewMessage {
    /// Build and validate a message event. Timestamps are truncated to microseconds, the
    /// precision Postgres stores.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        phone: &str,
        channel: String,
        direction: Direction,
        sender: SenderRole,
        content: Option<String>,
        media: Option<MediaDescriptor>,
        correlation_id: Option<String>,
        created_at: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        let phone = normalize_phone(phone)?;

        let content = content.filter(|c| !c.trim().is_empty());
        if let Some(ref c) = content {
            if c.chars().count() > MAX_CONTENT_LENGTH {
                return Err(Error::Validation(format!(
                    "Content must be at most {} characters",
                    MAX_CONTENT_LENGTH
                )));
            }
        }
        if let Some(ref m) = media {
            m.validate()?;
        }
        if content.is_none() && media.is_none() {
            return Err(Error::Validation(
                "Message requires text content or media".to_string(),
            ));
        }

        let correlation_id = correlation_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        if direction == Direction::Inbound && sender != SenderRole::Lead {
            return Err(Error::Validation(
                "Inbound messages are always sent by the lead".to_string(),
            ));
        }
        if direction == Direction::Outbound && sender == SenderRole::Lead {
            return Err(Error::Validation(
                "Outbound messages are sent by an agent or the system".to_string(),
            ));
        }

        Ok(NewMessage {
            phone,
            name: None,
            channel,
            direction,
            sender,
            content,
            media,
            correlation_id,
            created_at: created_at.unwrap_or_else(Utc::now).trunc_subsecs(6),
            sentiment: None,
        })
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|n| !n.trim().is_empty());
        self
    }
}

/// Append-only sentiment classification record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SentimentRecord {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub message_id: Option<Uuid>,
    pub label: SentimentLabel,
    pub confidence: f64,
    pub source_text: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SentimentRecord {
    pub fn new(
        lead_id: Uuid,
        message_id: Option<Uuid>,
        label: SentimentLabel,
        confidence: f64,
        source_text: Option<String>,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::Validation(
                "Confidence must be between 0 and 1".to_string(),
            ));
        }
        Ok(SentimentRecord {
            id: Uuid::new_v4(),
            lead_id,
            message_id,
            label,
            confidence,
            source_text,
            created_at: now_micros(),
        })
    }
}

/// A delivery-status report from the gateway. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub correlation_id: String,
    pub status: DeliveryStatus,
    pub event_at: DateTime<Utc>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl StatusEvent {
    pub fn new(correlation_id: &str, status: DeliveryStatus, event_at: DateTime<Utc>) -> Result<Self> {
        let correlation_id = correlation_id.trim();
        if correlation_id.is_empty() {
            return Err(Error::Validation("correlation_id is required".to_string()));
        }
        if status == DeliveryStatus::Received {
            return Err(Error::Validation(
                "received is not a reportable delivery status".to_string(),
            ));
        }
        Ok(StatusEvent {
            correlation_id: correlation_id.to_string(),
            status,
            event_at: event_at.trunc_subsecs(6),
            error_code: None,
            error_message: None,
        })
    }

    pub fn with_error(mut self, code: Option<String>, message: Option<String>) -> Self {
        self.error_code = code;
        self.error_message = message;
        self
    }
}

/// Position in a newest-first message history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl HistoryCursor {
    pub fn after(message: &Message) -> Self {
        HistoryCursor {
            created_at: message.created_at,
            id: message.id,
        }
    }

    pub fn encode(&self) -> String {
        let raw = format!(
            "{}|{}",
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.id
        );
        URL_SAFE_NO_PAD.encode(raw)
    }

    pub fn decode(cursor: &str) -> Result<Self> {
        let invalid = || Error::Validation("Invalid cursor".to_string());
        let bytes = URL_SAFE_NO_PAD.decode(cursor).map_err(|_| invalid())?;
        let raw = String::from_utf8(bytes).map_err(|_| invalid())?;
        let (at, id) = raw.split_once('|').ok_or_else(invalid)?;
        Ok(HistoryCursor {
            created_at: DateTime::parse_from_rfc3339(at)
                .map_err(|_| invalid())?
                .with_timezone(&Utc),
            id: Uuid::parse_str(id).map_err(|_| invalid())?,
        })
    }

    /// Whether `message` belongs to the page after this cursor (newest-first order)
    pub fn admits(&self, message: &Message) -> bool {
        (message.created_at, message.id) < (self.created_at, self.id)
    }
}

/// One page of message history, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub messages: Vec<Message>,
    pub next_cursor: Option<String>,
}

impl HistoryPage {
    /// Build a page from up to `limit + 1` rows; the extra row only signals that more exist
    pub fn from_rows(mut rows: Vec<Message>, limit: i64) -> Self {
        let limit = limit.max(1) as usize;
        let has_more = rows.len() > limit;
        rows.truncate(limit);
        let next_cursor = if has_more {
            rows.last().map(|m| HistoryCursor::after(m).encode())
        } else {
            None
        };
        HistoryPage {
            messages: rows,
            next_cursor,
        }
    }
}

/// Current time at the precision Postgres stores
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
