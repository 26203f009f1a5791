//! `MessagingStore` over Postgres
//!
//! Writes run in one transaction each. Row locks are always taken message first, then
//! conversation, so concurrent status and sentiment updates cannot deadlock.

use async_trait::async_trait;
use uuid::Uuid;

use leadline_common::{Error, RepositoryError, Result};

use super::transactions::*;
use super::{
    AppendOutcome, MessageCounts, MessagingRepositories, MessagingStore, SentimentChange,
    StatusChange,
};
use crate::domain::entities::{
    Conversation, HistoryCursor, Lead, LeadStatus, LeadUpdate, Message, NewMessage,
    SentimentLabel, SentimentRecord, StatusEvent,
};
use crate::domain::state::{ConversationEvent, StatusDecision};

fn message_not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Message {} not found", id))
}

fn conversation_not_found(id: Uuid) -> Error {
    Error::NotFound(format!("Conversation {} not found", id))
}

impl MessagingRepositories {
    /// Rebuild the outcome for a correlation id that is already in the ledger
    async fn existing_outcome(&self, message: Message) -> Result<AppendOutcome> {
        let conversation = self
            .conversations
            .find(message.conversation_id)
            .await?
            .ok_or_else(|| conversation_not_found(message.conversation_id))?;
        let lead = self
            .leads
            .find(message.lead_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lead {} not found", message.lead_id)))?;
        Ok(AppendOutcome {
            lead,
            lead_created: false,
            conversation,
            message,
            duplicate: true,
        })
    }
}

#[async_trait]
impl MessagingStore for MessagingRepositories {
    async fn resolve_lead(&self, phone: &str, name: Option<&str>) -> Result<(Lead, bool)> {
        let mut tx = self.begin().await?;
        let candidate = Lead::new(phone.to_string(), name.map(str::to_string));
        let resolved = match insert_lead_if_absent_tx(&mut tx, &candidate).await? {
            Some(lead) => (lead, true),
            None => {
                let lead = find_lead_by_phone_tx(&mut tx, phone, false)
                    .await?
                    .ok_or_else(|| Error::Internal(format!("Lead {} vanished", phone)))?;
                (lead, false)
            }
        };
        tx.commit().await?;
        Ok(resolved)
    }

    async fn get_lead(&self, phone: &str) -> Result<Option<Lead>> {
        self.leads.find_by_phone(phone).await
    }

    async fn list_leads(
        &self,
        status: Option<LeadStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Lead>> {
        self.leads.list(status, offset, limit).await
    }

    async fn update_lead(&self, phone: &str, update: &LeadUpdate) -> Result<Option<Lead>> {
        let mut tx = self.begin().await?;
        let Some(mut lead) = find_lead_by_phone_tx(&mut tx, phone, true).await? else {
            return Ok(None);
        };
        update.apply(&mut lead);
        let lead = update_lead_tx(&mut tx, &lead).await?;
        tx.commit().await?;
        Ok(Some(lead))
    }

    async fn delete_lead(&self, phone: &str) -> Result<bool> {
        self.leads.delete(phone).await
    }

    async fn append(&self, new: &NewMessage) -> Result<AppendOutcome> {
        if let Some(cid) = new.correlation_id.as_deref() {
            if let Some(existing) = self.messages.find_by_correlation(cid).await? {
                return self.existing_outcome(existing).await;
            }
        }

        let mut tx = self.begin().await?;

        let candidate = Lead::new(new.phone.clone(), new.name.clone());
        let (lead, lead_created) = match insert_lead_if_absent_tx(&mut tx, &candidate).await? {
            Some(lead) => (lead, true),
            None => {
                let lead = find_lead_by_phone_tx(&mut tx, &new.phone, false)
                    .await?
                    .ok_or_else(|| Error::Internal(format!("Lead {} vanished", new.phone)))?;
                (lead, false)
            }
        };

        let mut conversation = match lock_active_conversation_tx(&mut tx, lead.id, &new.channel)
            .await?
        {
            Some(conversation) => conversation,
            None => {
                let candidate = Conversation::new(&lead, new.channel.clone());
                match insert_active_conversation_tx(&mut tx, &candidate).await? {
                    Some(conversation) => conversation,
                    // A concurrent append opened it between our read and insert
                    None => lock_active_conversation_tx(&mut tx, lead.id, &new.channel)
                        .await?
                        .ok_or_else(|| {
                            Error::Internal("Active conversation vanished".to_string())
                        })?,
                }
            }
        };

        let candidate = Message::from_new(new, &conversation);
        let Some(message) = insert_message_tx(&mut tx, &candidate).await? else {
            tx.rollback().await?;
            let cid = new.correlation_id.as_deref().unwrap_or_default();
            let existing = self
                .messages
                .find_by_correlation(cid)
                .await?
                .ok_or_else(|| Error::Internal(format!("Message {} vanished", cid)))?;
            return self.existing_outcome(existing).await;
        };

        conversation.record_message(&message)?;
        let conversation = update_conversation_tx(&mut tx, &conversation).await?;

        tx.commit().await?;

        Ok(AppendOutcome {
            lead,
            lead_created,
            conversation,
            message,
            duplicate: false,
        })
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        self.messages.find(id).await
    }

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Option<Message>> {
        self.messages.find_by_correlation(correlation_id).await
    }

    async fn history(
        &self,
        phone: &str,
        limit: i64,
        cursor: Option<HistoryCursor>,
    ) -> Result<Vec<Message>> {
        self.messages.history(phone, limit, cursor).await
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>> {
        self.messages
            .recent_for_conversation(conversation_id, limit)
            .await
    }

    async fn assign_correlation(&self, message_id: Uuid, correlation_id: &str) -> Result<Message> {
        let mut tx = self.begin().await?;
        let mut message = lock_message_tx(&mut tx, message_id)
            .await?
            .ok_or_else(|| message_not_found(message_id))?;

        if !message.assign_correlation(correlation_id)? {
            return Ok(message);
        }

        let message = update_message_tx(&mut tx, &message)
            .await
            .map_err(RepositoryError::classify)?;
        tx.commit().await?;
        Ok(message)
    }

    async fn apply_status(&self, event: &StatusEvent) -> Result<Option<StatusChange>> {
        let mut tx = self.begin().await?;
        let Some(mut message) = lock_message_by_correlation_tx(&mut tx, &event.correlation_id).await?
        else {
            return Ok(None);
        };

        let decision = message.apply_status(event);
        if decision == StatusDecision::Apply {
            message = update_message_tx(&mut tx, &message).await?;
        }
        tx.commit().await?;

        Ok(Some(StatusChange { decision, message }))
    }

    async fn fail_message(
        &self,
        message_id: Uuid,
        error_code: Option<&str>,
        error_message: &str,
    ) -> Result<StatusChange> {
        let mut tx = self.begin().await?;
        let mut message = lock_message_tx(&mut tx, message_id)
            .await?
            .ok_or_else(|| message_not_found(message_id))?;

        message.mark_failed(error_code, error_message)?;
        let message = update_message_tx(&mut tx, &message).await?;
        tx.commit().await?;

        Ok(StatusChange {
            decision: StatusDecision::Apply,
            message,
        })
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.conversations.find(id).await
    }

    async fn list_conversations(&self, phone: &str) -> Result<Vec<Conversation>> {
        self.conversations.list_by_phone(phone).await
    }

    async fn transition_conversation(
        &self,
        id: Uuid,
        event: ConversationEvent,
    ) -> Result<Conversation> {
        let mut tx = self.begin().await?;
        let mut conversation = lock_conversation_tx(&mut tx, id)
            .await?
            .ok_or_else(|| conversation_not_found(id))?;

        let other_active = match event {
            ConversationEvent::Unarchive => {
                other_active_conversation_exists_tx(&mut tx, &conversation).await?
            }
            ConversationEvent::Archive => false,
        };
        conversation.apply_event(event, other_active)?;

        // The partial unique index still guards against a racing append
        let conversation = update_conversation_tx(&mut tx, &conversation)
            .await
            .map_err(RepositoryError::classify)?;
        tx.commit().await?;
        Ok(conversation)
    }

    async fn reconcile(&self, id: Uuid) -> Result<(Conversation, bool)> {
        let mut tx = self.begin().await?;
        let mut conversation = lock_conversation_tx(&mut tx, id)
            .await?
            .ok_or_else(|| conversation_not_found(id))?;

        let (count, last) = conversation_ledger_summary_tx(&mut tx, id).await?;
        if !conversation.reconcile_with(count, last)? {
            return Ok((conversation, false));
        }

        let conversation = update_conversation_tx(&mut tx, &conversation).await?;
        tx.commit().await?;
        Ok((conversation, true))
    }

    async fn record_sentiment(
        &self,
        message_id: Uuid,
        label: SentimentLabel,
        confidence: f64,
    ) -> Result<SentimentChange> {
        let mut tx = self.begin().await?;
        let mut message = lock_message_tx(&mut tx, message_id)
            .await?
            .ok_or_else(|| message_not_found(message_id))?;
        let mut conversation = lock_conversation_tx(&mut tx, message.conversation_id)
            .await?
            .ok_or_else(|| conversation_not_found(message.conversation_id))?;

        let record = SentimentRecord::new(
            message.lead_id,
            Some(message.id),
            label,
            confidence,
            message.text().map(str::to_string),
        )?;
        let record = insert_sentiment_tx(&mut tx, &record).await?;

        message.set_sentiment(label, confidence);
        let message = update_message_tx(&mut tx, &message).await?;

        let rolled_up = conversation.roll_up_sentiment(label, message.created_at);
        if rolled_up {
            conversation = update_conversation_tx(&mut tx, &conversation).await?;
        }

        tx.commit().await?;

        Ok(SentimentChange {
            record,
            message,
            conversation,
            rolled_up,
        })
    }

    async fn recent_sentiments(&self, phone: &str, limit: i64) -> Result<Vec<SentimentRecord>> {
        self.sentiments.recent_for_phone(phone, limit).await
    }

    async fn message_counts(&self, phone: Option<&str>) -> Result<Vec<MessageCounts>> {
        self.messages.counts(phone).await
    }
}
