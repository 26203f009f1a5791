//! Conversation repository

use crate::domain::entities::Conversation;
use leadline_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) const CONVERSATION_COLUMNS: &str = "id, lead_id, phone, channel, status, message_count, \
     last_message_at, sentiment, sentiment_at, created_at, updated_at";

#[derive(Clone)]
pub struct ConversationRepository {
    pool: PgPool,
}

impl ConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Conversation>> {
        let query = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1");
        let conversation = sqlx::query_as::<_, Conversation>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(conversation)
    }

    /// All conversations for a phone, newest first
    pub async fn list_by_phone(&self, phone: &str) -> Result<Vec<Conversation>> {
        let query = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE phone = $1 \
             ORDER BY created_at DESC, id DESC"
        );
        let conversations = sqlx::query_as::<_, Conversation>(&query)
            .bind(phone)
            .fetch_all(&self.pool)
            .await?;
        Ok(conversations)
    }
}
