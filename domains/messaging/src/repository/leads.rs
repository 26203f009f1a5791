//! Lead repository

use crate::domain::entities::{Lead, LeadStatus};
use leadline_common::{RepositoryError, Result};
use sqlx::PgPool;
use uuid::Uuid;

pub(crate) const LEAD_COLUMNS: &str = "id, phone, name, email, status, notes, created_at, updated_at";

#[derive(Clone)]
pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<Lead>> {
        let query = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE phone = $1");
        let lead = sqlx::query_as::<_, Lead>(&query)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Lead>> {
        let query = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
        let lead = sqlx::query_as::<_, Lead>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lead)
    }

    /// List leads, newest first, optionally filtered by status
    pub async fn list(
        &self,
        status: Option<LeadStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Lead>> {
        let query = format!(
            "SELECT {LEAD_COLUMNS} FROM leads \
             WHERE ($1::lead_status IS NULL OR status = $1) \
             ORDER BY created_at DESC, id DESC \
             OFFSET $2 LIMIT $3"
        );
        let leads = sqlx::query_as::<_, Lead>(&query)
            .bind(status)
            .bind(offset)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(leads)
    }

    /// Delete a lead; conversations, messages and sentiment records cascade
    pub async fn delete(&self, phone: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM leads WHERE phone = $1")
            .bind(phone)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::classify)?;
        Ok(result.rows_affected() > 0)
    }
}
