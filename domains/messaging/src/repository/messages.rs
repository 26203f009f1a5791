//! Message ledger reads

use crate::domain::entities::{HistoryCursor, Message};
use crate::repository::MessageCounts;
use leadline_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) const MESSAGE_COLUMNS: &str = "id, conversation_id, lead_id, direction, sender, content, \
     media, correlation_id, status, status_at, error_code, error_message, sentiment, \
     sentiment_confidence, created_at, updated_at";

#[derive(Clone)]
pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Message>> {
        let query = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    pub async fn find_by_correlation(&self, correlation_id: &str) -> Result<Option<Message>> {
        let query = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE correlation_id = $1");
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(correlation_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(message)
    }

    /// Keyset page of a phone's messages, newest first
    pub async fn history(
        &self,
        phone: &str,
        limit: i64,
        cursor: Option<HistoryCursor>,
    ) -> Result<Vec<Message>> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE lead_id = (SELECT id FROM leads WHERE phone = $1) \
               AND ($2::timestamptz IS NULL OR (created_at, id) < ($2, $3)) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $4"
        );
        let messages = sqlx::query_as::<_, Message>(&query)
            .bind(phone)
            .bind(cursor.map(|c| c.created_at))
            .bind(cursor.map(|c| c.id))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    /// Latest `limit` messages of a conversation, returned oldest first
    pub async fn recent_for_conversation(
        &self,
        conversation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<Message>> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM ( \
                SELECT {MESSAGE_COLUMNS} FROM messages \
                WHERE conversation_id = $1 \
                ORDER BY created_at DESC, id DESC \
                LIMIT $2 \
             ) recent \
             ORDER BY created_at ASC, id ASC"
        );
        let messages = sqlx::query_as::<_, Message>(&query)
            .bind(conversation_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(messages)
    }

    /// Live counters per phone. Leads without messages yield zero rows of counts.
    pub async fn counts(&self, phone: Option<&str>) -> Result<Vec<MessageCounts>> {
        let counts = sqlx::query_as::<_, MessageCounts>(
            r#"
            SELECT l.phone,
                   COUNT(m.id) AS total_messages,
                   COUNT(m.id) FILTER (WHERE m.direction = 'outbound') AS outbound_count,
                   COUNT(m.id) FILTER (WHERE m.direction = 'inbound') AS inbound_count,
                   COUNT(m.id) FILTER (WHERE m.status IN ('delivered', 'read')) AS delivered_count,
                   COUNT(m.id) FILTER (WHERE m.status = 'read') AS read_count,
                   COUNT(m.id) FILTER (WHERE m.status = 'failed') AS failed_count,
                   MAX(m.created_at) AS last_activity
            FROM leads l
            LEFT JOIN messages m ON m.lead_id = l.id
            WHERE ($1::text IS NULL OR l.phone = $1)
            GROUP BY l.phone
            ORDER BY l.phone
            "#,
        )
        .bind(phone)
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }
}
