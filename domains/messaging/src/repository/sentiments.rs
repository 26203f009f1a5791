//! Sentiment record repository

use crate::domain::entities::SentimentRecord;
use leadline_common::Result;
use sqlx::PgPool;

pub(crate) const SENTIMENT_COLUMNS: &str =
    "id, lead_id, message_id, label, confidence, source_text, created_at";

#[derive(Clone)]
pub struct SentimentRepository {
    pool: PgPool,
}

impl SentimentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Latest records for a phone, newest first
    pub async fn recent_for_phone(&self, phone: &str, limit: i64) -> Result<Vec<SentimentRecord>> {
        let query = format!(
            "SELECT {SENTIMENT_COLUMNS} FROM sentiment_records \
             WHERE lead_id = (SELECT id FROM leads WHERE phone = $1) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2"
        );
        let records = sqlx::query_as::<_, SentimentRecord>(&query)
            .bind(phone)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }
}
