//! Persistence for the Messaging domain
//!
//! `MessagingStore` is the seam between the service and storage. `MessagingRepositories`
//! implements it over Postgres; `MemoryStore` implements it in process for tests and local runs.
//! Both run the same pure state-machine decisions inside their own atomic sections.

pub mod conversations;
pub mod leads;
pub mod memory;
pub mod messages;
pub mod postgres;
pub mod sentiments;
pub mod transactions;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use leadline_common::Result;

use crate::domain::entities::{
    Conversation, HistoryCursor, Lead, LeadStatus, LeadUpdate, Message, NewMessage,
    SentimentLabel, SentimentRecord, StatusEvent,
};
use crate::domain::state::{ConversationEvent, StatusDecision};

pub use conversations::ConversationRepository;
pub use leads::LeadRepository;
pub use memory::MemoryStore;
pub use messages::MessageRepository;
pub use sentiments::SentimentRepository;

/// What `append` did
#[derive(Debug, Clone, PartialEq)]
pub struct AppendOutcome {
    pub lead: Lead,
    pub lead_created: bool,
    pub conversation: Conversation,
    pub message: Message,
    /// The correlation id was already recorded; nothing was written
    pub duplicate: bool,
}

/// Result of running a status event (or a local failure) against a message
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub decision: StatusDecision,
    /// The message after the decision was applied
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentChange {
    pub record: SentimentRecord,
    pub message: Message,
    pub conversation: Conversation,
    /// Whether the label became the conversation's sentiment
    pub rolled_up: bool,
}

/// Raw per-phone message counters; rates are derived by the analytics engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct MessageCounts {
    pub phone: String,
    pub total_messages: i64,
    pub outbound_count: i64,
    pub inbound_count: i64,
    /// Status delivered or read
    pub delivered_count: i64,
    pub read_count: i64,
    pub failed_count: i64,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Storage operations the messaging service needs. Every method is atomic.
#[async_trait::async_trait]
pub trait MessagingStore: Send + Sync {
    /// Insert-if-absent, else fetch. Returns the lead and whether it was created.
    async fn resolve_lead(&self, phone: &str, name: Option<&str>) -> Result<(Lead, bool)>;

    async fn get_lead(&self, phone: &str) -> Result<Option<Lead>>;

    async fn list_leads(
        &self,
        status: Option<LeadStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Lead>>;

    /// `None` when no lead has this phone
    async fn update_lead(&self, phone: &str, update: &LeadUpdate) -> Result<Option<Lead>>;

    /// Delete a lead with its conversations, messages and sentiment records
    async fn delete_lead(&self, phone: &str) -> Result<bool>;

    /// Idempotent append plus conversation summary update, in one atomic unit
    async fn append(&self, new: &NewMessage) -> Result<AppendOutcome>;

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>>;

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Option<Message>>;

    /// Newest-first history for a phone, strictly after `cursor`, at most `limit` rows
    async fn history(
        &self,
        phone: &str,
        limit: i64,
        cursor: Option<HistoryCursor>,
    ) -> Result<Vec<Message>>;

    /// Latest messages of a conversation, oldest first
    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>>;

    /// Attach the gateway id to an outbound message recorded before the send
    async fn assign_correlation(&self, message_id: Uuid, correlation_id: &str) -> Result<Message>;

    /// Run a status event under the message's lock. `None` when the correlation id is unknown.
    async fn apply_status(&self, event: &StatusEvent) -> Result<Option<StatusChange>>;

    /// Move a message to `failed` now, after a local send failure
    async fn fail_message(
        &self,
        message_id: Uuid,
        error_code: Option<&str>,
        error_message: &str,
    ) -> Result<StatusChange>;

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>>;

    /// All conversations of a phone, newest first
    async fn list_conversations(&self, phone: &str) -> Result<Vec<Conversation>>;

    async fn transition_conversation(
        &self,
        id: Uuid,
        event: ConversationEvent,
    ) -> Result<Conversation>;

    /// Recompute summary counters from the ledger. Returns the conversation and whether it changed.
    async fn reconcile(&self, id: Uuid) -> Result<(Conversation, bool)>;

    async fn record_sentiment(
        &self,
        message_id: Uuid,
        label: SentimentLabel,
        confidence: f64,
    ) -> Result<SentimentChange>;

    /// Newest-first sentiment records for a phone
    async fn recent_sentiments(&self, phone: &str, limit: i64) -> Result<Vec<SentimentRecord>>;

    /// Counters for one phone, or for every phone when `None`
    async fn message_counts(&self, phone: Option<&str>) -> Result<Vec<MessageCounts>>;
}

/// Combined Postgres repository access for the Messaging domain
#[derive(Clone)]
pub struct MessagingRepositories {
    pool: PgPool,
    pub leads: LeadRepository,
    pub conversations: ConversationRepository,
    pub messages: MessageRepository,
    pub sentiments: SentimentRepository,
}

impl MessagingRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            leads: LeadRepository::new(pool.clone()),
            conversations: ConversationRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            sentiments: SentimentRepository::new(pool.clone()),
            pool,
        }
    }

    /// Begin a new database transaction.
    pub async fn begin(&self) -> std::result::Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
