//! Transaction helpers for the Messaging domain

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::conversations::CONVERSATION_COLUMNS;
use super::leads::LEAD_COLUMNS;
use super::messages::MESSAGE_COLUMNS;
use super::sentiments::SENTIMENT_COLUMNS;
use crate::domain::entities::{Conversation, Lead, Message, SentimentRecord};

/// Insert a lead unless the phone is taken. `None` means another writer got there first.
pub async fn insert_lead_if_absent_tx(
    tx: &mut Transaction<'_, Postgres>,
    lead: &Lead,
) -> Result<Option<Lead>, sqlx::Error> {
    let query = format!(
        "INSERT INTO leads ({LEAD_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (phone) DO NOTHING \
         RETURNING {LEAD_COLUMNS}"
    );
    sqlx::query_as::<_, Lead>(&query)
        .bind(lead.id)
        .bind(&lead.phone)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(lead.status)
        .bind(&lead.notes)
        .bind(lead.created_at)
        .bind(lead.updated_at)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn find_lead_by_phone_tx(
    tx: &mut Transaction<'_, Postgres>,
    phone: &str,
    for_update: bool,
) -> Result<Option<Lead>, sqlx::Error> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let query = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE phone = $1{lock}");
    sqlx::query_as::<_, Lead>(&query)
        .bind(phone)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn update_lead_tx(
    tx: &mut Transaction<'_, Postgres>,
    lead: &Lead,
) -> Result<Lead, sqlx::Error> {
    let query = format!(
        "UPDATE leads SET name = $2, email = $3, status = $4, notes = $5, updated_at = $6 \
         WHERE id = $1 \
         RETURNING {LEAD_COLUMNS}"
    );
    sqlx::query_as::<_, Lead>(&query)
        .bind(lead.id)
        .bind(&lead.name)
        .bind(&lead.email)
        .bind(lead.status)
        .bind(&lead.notes)
        .bind(lead.updated_at)
        .fetch_one(&mut **tx)
        .await
}

/// Lock the active conversation for (lead, channel), if there is one
pub async fn lock_active_conversation_tx(
    tx: &mut Transaction<'_, Postgres>,
    lead_id: Uuid,
    channel: &str,
) -> Result<Option<Conversation>, sqlx::Error> {
    let query = format!(
        "SELECT {CONVERSATION_COLUMNS} FROM conversations \
         WHERE lead_id = $1 AND channel = $2 AND status = 'active' \
         FOR UPDATE"
    );
    sqlx::query_as::<_, Conversation>(&query)
        .bind(lead_id)
        .bind(channel)
        .fetch_optional(&mut **tx)
        .await
}

/// Insert an active conversation unless one already exists for (lead, channel)
pub async fn insert_active_conversation_tx(
    tx: &mut Transaction<'_, Postgres>,
    conversation: &Conversation,
) -> Result<Option<Conversation>, sqlx::Error> {
    let query = format!(
        "INSERT INTO conversations ({CONVERSATION_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         ON CONFLICT (lead_id, channel) WHERE status = 'active' DO NOTHING \
         RETURNING {CONVERSATION_COLUMNS}"
    );
    sqlx::query_as::<_, Conversation>(&query)
        .bind(conversation.id)
        .bind(conversation.lead_id)
        .bind(&conversation.phone)
        .bind(&conversation.channel)
        .bind(conversation.status)
        .bind(conversation.message_count)
        .bind(conversation.last_message_at)
        .bind(conversation.sentiment)
        .bind(conversation.sentiment_at)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn lock_conversation_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Conversation>, sqlx::Error> {
    let query = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, Conversation>(&query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
}

/// Whether another conversation is active for the same (lead, channel)
pub async fn other_active_conversation_exists_tx(
    tx: &mut Transaction<'_, Postgres>,
    conversation: &Conversation,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM conversations \
         WHERE lead_id = $1 AND channel = $2 AND status = 'active' AND id <> $3)",
    )
    .bind(conversation.lead_id)
    .bind(&conversation.channel)
    .bind(conversation.id)
    .fetch_one(&mut **tx)
    .await
}

/// Write every mutable conversation field
pub async fn update_conversation_tx(
    tx: &mut Transaction<'_, Postgres>,
    conversation: &Conversation,
) -> Result<Conversation, sqlx::Error> {
    let query = format!(
        "UPDATE conversations SET \
            status = $2, message_count = $3, last_message_at = $4, \
            sentiment = $5, sentiment_at = $6, updated_at = $7 \
         WHERE id = $1 \
         RETURNING {CONVERSATION_COLUMNS}"
    );
    sqlx::query_as::<_, Conversation>(&query)
        .bind(conversation.id)
        .bind(conversation.status)
        .bind(conversation.message_count)
        .bind(conversation.last_message_at)
        .bind(conversation.sentiment)
        .bind(conversation.sentiment_at)
        .bind(conversation.updated_at)
        .fetch_one(&mut **tx)
        .await
}

/// Message count and latest creation time straight from the ledger
pub async fn conversation_ledger_summary_tx(
    tx: &mut Transaction<'_, Postgres>,
    conversation_id: Uuid,
) -> Result<(i64, Option<DateTime<Utc>>), sqlx::Error> {
    sqlx::query_as::<_, (i64, Option<DateTime<Utc>>)>(
        "SELECT COUNT(*), MAX(created_at) FROM messages WHERE conversation_id = $1",
    )
    .bind(conversation_id)
    .fetch_one(&mut **tx)
    .await
}

/// Insert a message unless its correlation id is already recorded
pub async fn insert_message_tx(
    tx: &mut Transaction<'_, Postgres>,
    message: &Message,
) -> Result<Option<Message>, sqlx::Error> {
    let query = format!(
        "INSERT INTO messages ({MESSAGE_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         ON CONFLICT (correlation_id) DO NOTHING \
         RETURNING {MESSAGE_COLUMNS}"
    );
    sqlx::query_as::<_, Message>(&query)
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.lead_id)
        .bind(message.direction)
        .bind(message.sender)
        .bind(&message.content)
        .bind(&message.media)
        .bind(&message.correlation_id)
        .bind(message.status)
        .bind(message.status_at)
        .bind(&message.error_code)
        .bind(&message.error_message)
        .bind(message.sentiment)
        .bind(message.sentiment_confidence)
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn lock_message_by_correlation_tx(
    tx: &mut Transaction<'_, Postgres>,
    correlation_id: &str,
) -> Result<Option<Message>, sqlx::Error> {
    let query = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages WHERE correlation_id = $1 FOR UPDATE"
    );
    sqlx::query_as::<_, Message>(&query)
        .bind(correlation_id)
        .fetch_optional(&mut **tx)
        .await
}

pub async fn lock_message_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
) -> Result<Option<Message>, sqlx::Error> {
    let query = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1 FOR UPDATE");
    sqlx::query_as::<_, Message>(&query)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
}

/// Write status, correlation, error and sentiment fields of a locked message
pub async fn update_message_tx(
    tx: &mut Transaction<'_, Postgres>,
    message: &Message,
) -> Result<Message, sqlx::Error> {
    let query = format!(
        "UPDATE messages SET \
            correlation_id = $2, status = $3, status_at = $4, \
            error_code = $5, error_message = $6, \
            sentiment = $7, sentiment_confidence = $8, updated_at = $9 \
         WHERE id = $1 \
         RETURNING {MESSAGE_COLUMNS}"
    );
    sqlx::query_as::<_, Message>(&query)
        .bind(message.id)
        .bind(&message.correlation_id)
        .bind(message.status)
        .bind(message.status_at)
        .bind(&message.error_code)
        .bind(&message.error_message)
        .bind(message.sentiment)
        .bind(message.sentiment_confidence)
        .bind(message.updated_at)
        .fetch_one(&mut **tx)
        .await
}

pub async fn insert_sentiment_tx(
    tx: &mut Transaction<'_, Postgres>,
    record: &SentimentRecord,
) -> Result<SentimentRecord, sqlx::Error> {
    let query = format!(
        "INSERT INTO sentiment_records ({SENTIMENT_COLUMNS}) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING {SENTIMENT_COLUMNS}"
    );
    sqlx::query_as::<_, SentimentRecord>(&query)
        .bind(record.id)
        .bind(record.lead_id)
        .bind(record.message_id)
        .bind(record.label)
        .bind(record.confidence)
        .bind(&record.source_text)
        .bind(record.created_at)
        .fetch_one(&mut **tx)
        .await
}
