//! In-process `MessagingStore`
//!
//! A single async mutex makes every operation atomic, which gives the same guarantees the
//! Postgres store gets from row locks and unique indexes.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use leadline_common::{Error, Result};

use super::{AppendOutcome, MessageCounts, MessagingStore, SentimentChange, StatusChange};
use crate::domain::entities::{
    Conversation, ConversationStatus, DeliveryStatus, Direction, HistoryCursor, Lead, LeadStatus,
    LeadUpdate, Message, NewMessage, SentimentLabel, SentimentRecord, StatusEvent,
};
use crate::domain::state::{ConversationEvent, StatusDecision};

#[derive(Default)]
struct State {
    leads: HashMap<Uuid, Lead>,
    leads_by_phone: HashMap<String, Uuid>,
    conversations: HashMap<Uuid, Conversation>,
    messages: HashMap<Uuid, Message>,
    by_correlation: HashMap<String, Uuid>,
    sentiments: Vec<SentimentRecord>,
}

impl State {
    fn lead_by_phone(&self, phone: &str) -> Option<&Lead> {
        self.leads_by_phone
            .get(phone)
            .and_then(|id| self.leads.get(id))
    }

    fn resolve_lead(&mut self, phone: &str, name: Option<String>) -> (Lead, bool) {
        if let Some(lead) = self.lead_by_phone(phone) {
            return (lead.clone(), false);
        }
        let lead = Lead::new(phone.to_string(), name);
        self.leads_by_phone.insert(lead.phone.clone(), lead.id);
        self.leads.insert(lead.id, lead.clone());
        (lead, true)
    }

    fn active_conversation(&self, lead_id: Uuid, channel: &str) -> Option<Uuid> {
        self.conversations
            .values()
            .find(|c| {
                c.lead_id == lead_id
                    && c.channel == channel
                    && c.status == ConversationStatus::Active
            })
            .map(|c| c.id)
    }

    fn existing_outcome(&self, message_id: Uuid) -> Result<AppendOutcome> {
        let message = self.message(message_id)?.clone();
        let conversation = self.conversation(message.conversation_id)?.clone();
        let lead = self
            .leads
            .get(&message.lead_id)
            .cloned()
            .ok_or_else(|| Error::Internal(format!("Lead {} missing", message.lead_id)))?;
        Ok(AppendOutcome {
            lead,
            lead_created: false,
            conversation,
            message,
            duplicate: true,
        })
    }

    fn message(&self, id: Uuid) -> Result<&Message> {
        self.messages
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Message {} not found", id)))
    }

    fn message_mut(&mut self, id: Uuid) -> Result<&mut Message> {
        self.messages
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("Message {} not found", id)))
    }

    fn conversation(&self, id: Uuid) -> Result<&Conversation> {
        self.conversations
            .get(&id)
            .ok_or_else(|| Error::NotFound(format!("Conversation {} not found", id)))
    }

    fn counts_for(&self, lead: &Lead) -> MessageCounts {
        let mut counts = MessageCounts {
            phone: lead.phone.clone(),
            ..Default::default()
        };
        for message in self.messages.values().filter(|m| m.lead_id == lead.id) {
            counts.total_messages += 1;
            match message.direction {
                Direction::Outbound => counts.outbound_count += 1,
                Direction::Inbound => counts.inbound_count += 1,
            }
            match message.status {
                DeliveryStatus::Delivered => counts.delivered_count += 1,
                DeliveryStatus::Read => {
                    counts.delivered_count += 1;
                    counts.read_count += 1;
                }
                DeliveryStatus::Failed => counts.failed_count += 1,
                DeliveryStatus::Received | DeliveryStatus::Sent => {}
            }
            counts.last_activity = counts.last_activity.max(Some(message.created_at));
        }
        counts
    }
}

/// Newest first by (created_at, id)
fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
}

/// In-memory store for tests and single-process local runs
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a conversation's stored summary, for exercising reconciliation
    pub async fn corrupt_summary(&self, conversation_id: Uuid, message_count: i32) -> Result<()> {
        let mut state = self.state.lock().await;
        let conversation = state
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| Error::NotFound(format!("Conversation {} not found", conversation_id)))?;
        conversation.message_count = message_count;
        conversation.last_message_at = None;
        Ok(())
    }
}

#[async_trait]
impl MessagingStore for MemoryStore {
    async fn resolve_lead(&self, phone: &str, name: Option<&str>) -> Result<(Lead, bool)> {
        let mut state = self.state.lock().await;
        Ok(state.resolve_lead(phone, name.map(str::to_string)))
    }

    async fn get_lead(&self, phone: &str) -> Result<Option<Lead>> {
        let state = self.state.lock().await;
        Ok(state.lead_by_phone(phone).cloned())
    }

    async fn list_leads(
        &self,
        status: Option<LeadStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Lead>> {
        let state = self.state.lock().await;
        let mut leads: Vec<Lead> = state
            .leads
            .values()
            .filter(|l| status.is_none_or(|s| l.status == s))
            .cloned()
            .collect();
        leads.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(leads
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn update_lead(&self, phone: &str, update: &LeadUpdate) -> Result<Option<Lead>> {
        let mut state = self.state.lock().await;
        let Some(id) = state.leads_by_phone.get(phone).copied() else {
            return Ok(None);
        };
        let Some(lead) = state.leads.get_mut(&id) else {
            return Ok(None);
        };
        update.apply(lead);
        Ok(Some(lead.clone()))
    }

    async fn delete_lead(&self, phone: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(lead_id) = state.leads_by_phone.remove(phone) else {
            return Ok(false);
        };
        state.leads.remove(&lead_id);
        state.conversations.retain(|_, c| c.lead_id != lead_id);
        state.messages.retain(|_, m| m.lead_id != lead_id);
        let State {
            messages,
            by_correlation,
            sentiments,
            ..
        } = &mut *state;
        by_correlation.retain(|_, id| messages.contains_key(id));
        sentiments.retain(|s| s.lead_id != lead_id);
        Ok(true)
    }

    async fn append(&self, new: &NewMessage) -> Result<AppendOutcome> {
        let mut state = self.state.lock().await;

        if let Some(cid) = new.correlation_id.as_deref() {
            if let Some(id) = state.by_correlation.get(cid).copied() {
                return state.existing_outcome(id);
            }
        }

        let (lead, lead_created) = state.resolve_lead(&new.phone, new.name.clone());

        let conversation_id = match state.active_conversation(lead.id, &new.channel) {
            Some(id) => id,
            None => {
                let conversation = Conversation::new(&lead, new.channel.clone());
                let id = conversation.id;
                state.conversations.insert(id, conversation);
                id
            }
        };

        let mut conversation = state.conversation(conversation_id)?.clone();
        let message = Message::from_new(new, &conversation);
        conversation.record_message(&message)?;

        if let Some(cid) = &message.correlation_id {
            state.by_correlation.insert(cid.clone(), message.id);
        }
        state.messages.insert(message.id, message.clone());
        state
            .conversations
            .insert(conversation.id, conversation.clone());

        Ok(AppendOutcome {
            lead,
            lead_created,
            conversation,
            message,
            duplicate: false,
        })
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        let state = self.state.lock().await;
        Ok(state.messages.get(&id).cloned())
    }

    async fn find_by_correlation(&self, correlation_id: &str) -> Result<Option<Message>> {
        let state = self.state.lock().await;
        Ok(state
            .by_correlation
            .get(correlation_id)
            .and_then(|id| state.messages.get(id))
            .cloned())
    }

    async fn history(
        &self,
        phone: &str,
        limit: i64,
        cursor: Option<HistoryCursor>,
    ) -> Result<Vec<Message>> {
        let state = self.state.lock().await;
        let Some(lead) = state.lead_by_phone(phone) else {
            return Ok(Vec::new());
        };
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|m| m.lead_id == lead.id)
            .filter(|m| cursor.is_none_or(|c| c.admits(m)))
            .cloned()
            .collect();
        sort_newest_first(&mut messages);
        messages.truncate(limit.max(0) as usize);
        Ok(messages)
    }

    async fn recent_messages(&self, conversation_id: Uuid, limit: i64) -> Result<Vec<Message>> {
        let state = self.state.lock().await;
        let mut messages: Vec<Message> = state
            .messages
            .values()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect();
        sort_newest_first(&mut messages);
        messages.truncate(limit.max(0) as usize);
        messages.reverse();
        Ok(messages)
    }

    async fn assign_correlation(&self, message_id: Uuid, correlation_id: &str) -> Result<Message> {
        let mut state = self.state.lock().await;
        if let Some(owner) = state.by_correlation.get(correlation_id) {
            if *owner != message_id {
                return Err(Error::Conflict(format!(
                    "Correlation id {} already belongs to another message",
                    correlation_id
                )));
            }
        }
        let message = state.message_mut(message_id)?;
        message.assign_correlation(correlation_id)?;
        let message = message.clone();
        state
            .by_correlation
            .insert(correlation_id.to_string(), message_id);
        Ok(message)
    }

    async fn apply_status(&self, event: &StatusEvent) -> Result<Option<StatusChange>> {
        let mut state = self.state.lock().await;
        let Some(id) = state.by_correlation.get(&event.correlation_id).copied() else {
            return Ok(None);
        };
        let message = state.message_mut(id)?;
        let decision = message.apply_status(event);
        Ok(Some(StatusChange {
            decision,
            message: message.clone(),
        }))
    }

    async fn fail_message(
        &self,
        message_id: Uuid,
        error_code: Option<&str>,
        error_message: &str,
    ) -> Result<StatusChange> {
        let mut state = self.state.lock().await;
        let message = state.message_mut(message_id)?;
        message.mark_failed(error_code, error_message)?;
        Ok(StatusChange {
            decision: StatusDecision::Apply,
            message: message.clone(),
        })
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        let state = self.state.lock().await;
        Ok(state.conversations.get(&id).cloned())
    }

    async fn list_conversations(&self, phone: &str) -> Result<Vec<Conversation>> {
        let state = self.state.lock().await;
        let mut conversations: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.phone == phone)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(conversations)
    }

    async fn transition_conversation(
        &self,
        id: Uuid,
        event: ConversationEvent,
    ) -> Result<Conversation> {
        let mut state = self.state.lock().await;
        let mut conversation = state.conversation(id)?.clone();
        let other_active = state
            .active_conversation(conversation.lead_id, &conversation.channel)
            .is_some_and(|active| active != id);
        conversation.apply_event(event, other_active)?;
        state.conversations.insert(id, conversation.clone());
        Ok(conversation)
    }

    async fn reconcile(&self, id: Uuid) -> Result<(Conversation, bool)> {
        let mut state = self.state.lock().await;
        let mut conversation = state.conversation(id)?.clone();
        let (count, last) = state
            .messages
            .values()
            .filter(|m| m.conversation_id == id)
            .fold((0i64, None), |(count, last), m| {
                (count + 1, last.max(Some(m.created_at)))
            });
        let changed = conversation.reconcile_with(count, last)?;
        if changed {
            state.conversations.insert(id, conversation.clone());
        }
        Ok((conversation, changed))
    }

    async fn record_sentiment(
        &self,
        message_id: Uuid,
        label: SentimentLabel,
        confidence: f64,
    ) -> Result<SentimentChange> {
        let mut state = self.state.lock().await;
        let mut message = state.message(message_id)?.clone();
        let mut conversation = state.conversation(message.conversation_id)?.clone();

        let record = SentimentRecord::new(
            message.lead_id,
            Some(message.id),
            label,
            confidence,
            message.text().map(str::to_string),
        )?;

        message.set_sentiment(label, confidence);
        let rolled_up = conversation.roll_up_sentiment(label, message.created_at);

        state.sentiments.push(record.clone());
        state.messages.insert(message.id, message.clone());
        if rolled_up {
            state
                .conversations
                .insert(conversation.id, conversation.clone());
        }

        Ok(SentimentChange {
            record,
            message,
            conversation,
            rolled_up,
        })
    }

    async fn recent_sentiments(&self, phone: &str, limit: i64) -> Result<Vec<SentimentRecord>> {
        let state = self.state.lock().await;
        let Some(lead) = state.lead_by_phone(phone) else {
            return Ok(Vec::new());
        };
        // Insertion order breaks ties between records created in the same microsecond
        let mut records: Vec<(usize, SentimentRecord)> = state
            .sentiments
            .iter()
            .enumerate()
            .filter(|(_, s)| s.lead_id == lead.id)
            .map(|(i, s)| (i, s.clone()))
            .collect();
        records.sort_by(|(ia, a), (ib, b)| (b.created_at, ib).cmp(&(a.created_at, ia)));
        Ok(records
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, s)| s)
            .collect())
    }

    async fn message_counts(&self, phone: Option<&str>) -> Result<Vec<MessageCounts>> {
        let state = self.state.lock().await;
        let mut counts: Vec<MessageCounts> = match phone {
            Some(phone) => state
                .lead_by_phone(phone)
                .map(|lead| state.counts_for(lead))
                .into_iter()
                .collect(),
            None => state.leads.values().map(|l| state.counts_for(l)).collect(),
        };
        counts.sort_by(|a, b| a.phone.cmp(&b.phone));
        Ok(counts)
    }
}
