//! Messaging service
//!
//! Orchestrates the store, the change notifier and the external collaborators. Store calls are
//! atomic; everything here runs after they commit: publishing, buffered-status replay, gateway
//! sends and AI enrichment. Collaborator calls are bounded by timeouts and never hold a lock.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use leadline_common::extractors::MAX_LIMIT;
use leadline_common::{Config, Error, Result, UnknownStatusPolicy};
use leadline_gateway::{DeliveryGateway, GatewayError, MediaRef, SendRequest, StatusCallback, TemplateRef};
use leadline_llm::{classify_sentiment, draft_reply, LlmService};

use crate::analytics::{LeadStats, SentimentSummary, StatsReport, SENTIMENT_WINDOW};
use crate::domain::entities::{
    normalize_channel, normalize_phone, Conversation, DeliveryStatus, Direction, HistoryCursor,
    HistoryPage, Lead, LeadStatus, LeadUpdate, MediaDescriptor, Message, NewMessage, SenderRole,
    SentimentLabel, StatusEvent,
};
use crate::domain::events::{ChangeEvent, EventKind};
use crate::domain::state::{ConversationEvent, StatusDecision, StatusOutcome};
use crate::notifier::{ChangeNotifier, Subscription};
use crate::pending::StatusBuffer;
use crate::repository::{AppendOutcome, MessagingStore, SentimentChange, StatusChange};

/// History lines handed to the reply drafter
const REPLY_CONTEXT_MESSAGES: i64 = 6;

/// Runtime knobs for the service, usually derived from `Config`
#[derive(Debug, Clone)]
pub struct MessagingSettings {
    pub default_channel: String,
    pub unknown_status_policy: UnknownStatusPolicy,
    pub status_buffer_ttl: Duration,
    pub status_buffer_capacity: usize,
    pub ai_sentiment_enabled: bool,
    pub ai_auto_reply_enabled: bool,
    pub ai_timeout: Duration,
    /// Upper bound on one gateway send
    pub send_timeout: Duration,
}

impl MessagingSettings {
    pub fn from_config(config: &Config, send_timeout: Duration) -> Self {
        Self {
            default_channel: config.default_channel.clone(),
            unknown_status_policy: config.unknown_status_policy,
            status_buffer_ttl: config.status_buffer_ttl(),
            status_buffer_capacity: config.status_buffer_capacity,
            ai_sentiment_enabled: config.ai_sentiment_enabled,
            ai_auto_reply_enabled: config.ai_auto_reply_enabled,
            ai_timeout: config.ai_timeout(),
            send_timeout,
        }
    }
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            default_channel: "whatsapp".to_string(),
            unknown_status_policy: UnknownStatusPolicy::Discard,
            status_buffer_ttl: Duration::from_secs(300),
            status_buffer_capacity: 1000,
            ai_sentiment_enabled: false,
            ai_auto_reply_enabled: false,
            ai_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(10),
        }
    }
}

/// A message a lead sent us, as reported by the gateway webhook
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub phone: String,
    pub name: Option<String>,
    pub channel: Option<String>,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub correlation_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// An outbound message that was already handed to the gateway elsewhere
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub phone: String,
    pub channel: Option<String>,
    pub sender: SenderRole,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub correlation_id: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// An outbound message to deliver through the gateway
#[derive(Debug, Clone)]
pub struct SendMessage {
    pub phone: String,
    pub channel: Option<String>,
    pub sender: SenderRole,
    pub content: Option<String>,
    pub media: Option<MediaDescriptor>,
    pub template: Option<TemplateRef>,
}

/// What a status event did
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub outcome: StatusOutcome,
    /// The message as stored after the event; absent when buffered
    pub message: Option<Message>,
}

/// Turn a gateway callback into a status event
pub fn status_event_from_callback(callback: StatusCallback) -> Result<StatusEvent> {
    let status = DeliveryStatus::from_str(&callback.status)?;
    let event_at = callback
        .timestamp
        .to_datetime()
        .ok_or_else(|| Error::Validation("Invalid status timestamp".to_string()))?;
    Ok(StatusEvent::new(&callback.correlation_id, status, event_at)?
        .with_error(callback.error_code, callback.error_message))
}

fn gateway_error_code(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Configuration(_) => "configuration",
        GatewayError::Request(_) => "request",
        GatewayError::Rejected(_) => "rejected",
        GatewayError::Response(_) => "response",
    }
}

fn media_ref(media: &MediaDescriptor) -> Result<MediaRef> {
    let link = media
        .url
        .clone()
        .or_else(|| media.media_id.clone())
        .ok_or_else(|| Error::Validation("Media requires a url or a media_id".to_string()))?;
    Ok(MediaRef {
        kind: media.kind,
        link,
        caption: media.caption.clone(),
    })
}

pub struct MessagingService {
    store: Arc<dyn MessagingStore>,
    notifier: Arc<ChangeNotifier>,
    buffer: StatusBuffer,
    gateway: Arc<dyn DeliveryGateway>,
    llm: Arc<dyn LlmService>,
    settings: MessagingSettings,
}

impl MessagingService {
    pub fn new(
        store: Arc<dyn MessagingStore>,
        notifier: Arc<ChangeNotifier>,
        gateway: Arc<dyn DeliveryGateway>,
        llm: Arc<dyn LlmService>,
        settings: MessagingSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            buffer: StatusBuffer::new(settings.status_buffer_ttl, settings.status_buffer_capacity),
            gateway,
            llm,
            settings,
        }
    }

    pub fn store(&self) -> &Arc<dyn MessagingStore> {
        &self.store
    }

    pub fn settings(&self) -> &MessagingSettings {
        &self.settings
    }

    pub fn subscribe(&self, kinds: &[EventKind]) -> Subscription {
        let subscription = self.notifier.subscribe(kinds);
        tracing::debug!(
            subscribers = self.notifier.subscriber_count(),
            kinds = ?kinds,
            "Change feed subscriber added"
        );
        subscription
    }

    fn channel(&self, raw: Option<&str>) -> Result<String> {
        normalize_channel(raw, &self.settings.default_channel)
    }

    fn publish_append(&self, outcome: &AppendOutcome) {
        if outcome.duplicate {
            tracing::debug!(
                message_id = %outcome.message.id,
                correlation_id = ?outcome.message.correlation_id,
                "Duplicate message ignored"
            );
            return;
        }
        if outcome.lead_created {
            self.notifier.publish(ChangeEvent::lead_created(&outcome.lead));
        }
        self.notifier
            .publish(ChangeEvent::message_created(&outcome.message));
        self.notifier
            .publish(ChangeEvent::conversation_updated(&outcome.conversation));
    }

    /// Ingest a message from a lead. AI enrichment runs in the background after the message is
    /// recorded; its results reach subscribers through the change feed.
    pub async fn ingest_inbound(self: &Arc<Self>, input: InboundMessage) -> Result<AppendOutcome> {
        let new = NewMessage::new(
            &input.phone,
            self.channel(input.channel.as_deref())?,
            Direction::Inbound,
            SenderRole::Lead,
            input.content,
            input.media,
            input.correlation_id,
            input.timestamp,
        )?
        .with_name(input.name);

        let outcome = self.store.append(&new).await?;
        self.publish_append(&outcome);
        if outcome.duplicate {
            return Ok(outcome);
        }

        tracing::info!(
            phone = %outcome.lead.phone,
            message_id = %outcome.message.id,
            conversation_id = %outcome.conversation.id,
            "Inbound message recorded"
        );

        self.spawn_enrichment(&outcome);
        Ok(outcome)
    }

    /// Record an outbound message sent outside this service
    pub async fn record_outbound(&self, input: OutboundMessage) -> Result<AppendOutcome> {
        let new = NewMessage::new(
            &input.phone,
            self.channel(input.channel.as_deref())?,
            Direction::Outbound,
            input.sender,
            input.content,
            input.media,
            input.correlation_id,
            input.timestamp,
        )?;

        let mut outcome = self.store.append(&new).await?;
        self.publish_append(&outcome);
        if outcome.duplicate {
            return Ok(outcome);
        }

        tracing::info!(
            phone = %outcome.lead.phone,
            message_id = %outcome.message.id,
            correlation_id = ?outcome.message.correlation_id,
            "Outbound message recorded"
        );

        if let Some(cid) = outcome.message.correlation_id.clone() {
            if self.replay_buffered(&cid).await > 0 {
                if let Some(message) = self.store.get_message(outcome.message.id).await? {
                    outcome.message = message;
                }
            }
        }
        Ok(outcome)
    }

    /// Record an outbound message, hand it to the gateway and attach the returned correlation
    /// id. A gateway error or timeout leaves the message `failed` and surfaces as
    /// `ExternalService`.
    pub async fn send(&self, input: SendMessage) -> Result<Message> {
        let new = NewMessage::new(
            &input.phone,
            self.channel(input.channel.as_deref())?,
            Direction::Outbound,
            input.sender,
            input.content,
            input.media,
            None,
            None,
        )?;

        let request = SendRequest {
            phone: new.phone.clone(),
            content: new.content.clone(),
            media: new.media.as_ref().map(media_ref).transpose()?,
            template: input.template,
        };
        request
            .validate()
            .map_err(|e| Error::Validation(e.to_string()))?;

        let outcome = self.store.append(&new).await?;
        self.publish_append(&outcome);
        let message_id = outcome.message.id;

        let sent = tokio::time::timeout(self.settings.send_timeout, self.gateway.send(request)).await;
        let receipt = match sent {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(err)) => {
                self.fail_send(message_id, Some(gateway_error_code(&err)), &err.to_string())
                    .await?;
                return Err(Error::ExternalService(err.to_string()));
            }
            Err(_) => {
                let reason = format!(
                    "Gateway did not respond within {}ms",
                    self.settings.send_timeout.as_millis()
                );
                self.fail_send(message_id, Some("timeout"), &reason).await?;
                return Err(Error::ExternalService(reason));
            }
        };

        let message = self
            .store
            .assign_correlation(message_id, &receipt.correlation_id)
            .await?;
        tracing::info!(
            phone = %new.phone,
            message_id = %message_id,
            correlation_id = %receipt.correlation_id,
            "Message accepted by gateway"
        );

        if self.replay_buffered(&receipt.correlation_id).await > 0 {
            if let Some(current) = self.store.get_message(message_id).await? {
                return Ok(current);
            }
        }
        Ok(message)
    }

    async fn fail_send(&self, message_id: Uuid, code: Option<&str>, reason: &str) -> Result<()> {
        tracing::warn!(message_id = %message_id, error = %reason, "Gateway send failed");
        let change = self.store.fail_message(message_id, code, reason).await?;
        self.notifier
            .publish(ChangeEvent::message_status_changed(&change.message));
        Ok(())
    }

    /// Apply a delivery-status event. Unknown correlation ids are discarded (`NotFound`) or
    /// buffered, depending on the configured policy.
    pub async fn apply_status(&self, event: StatusEvent) -> Result<StatusReport> {
        if let Some(change) = self.store.apply_status(&event).await? {
            return Ok(self.finish_status(&event, change));
        }

        match self.settings.unknown_status_policy {
            UnknownStatusPolicy::Discard => {
                tracing::warn!(
                    correlation_id = %event.correlation_id,
                    status = %event.status,
                    "Status event for unknown correlation id discarded"
                );
                Err(Error::NotFound(format!(
                    "No message with correlation id {}",
                    event.correlation_id
                )))
            }
            UnknownStatusPolicy::Buffer => {
                let correlation_id = event.correlation_id.clone();
                if !self.buffer.push(event) {
                    tracing::warn!(
                        correlation_id = %correlation_id,
                        "Status buffer full, event discarded"
                    );
                    return Err(Error::NotFound(format!(
                        "No message with correlation id {}",
                        correlation_id
                    )));
                }
                tracing::info!(
                    correlation_id = %correlation_id,
                    held = self.buffer.len(),
                    "Status event buffered"
                );

                // The message may have landed between the lookup and the push
                if self.store.find_by_correlation(&correlation_id).await?.is_some() {
                    self.replay_buffered(&correlation_id).await;
                }
                Ok(StatusReport {
                    outcome: StatusOutcome::Buffered,
                    message: None,
                })
            }
        }
    }

    fn finish_status(&self, event: &StatusEvent, change: StatusChange) -> StatusReport {
        match change.decision {
            StatusDecision::Apply => {
                tracing::info!(
                    correlation_id = %event.correlation_id,
                    status = %event.status,
                    "Message status updated"
                );
                self.notifier
                    .publish(ChangeEvent::message_status_changed(&change.message));
            }
            StatusDecision::Duplicate => {
                tracing::debug!(
                    correlation_id = %event.correlation_id,
                    status = %event.status,
                    "Duplicate status event ignored"
                );
            }
            StatusDecision::Stale | StatusDecision::Regressed => {
                tracing::warn!(
                    correlation_id = %event.correlation_id,
                    status = %event.status,
                    current = %change.message.status,
                    decision = ?change.decision,
                    "Status event dropped"
                );
            }
        }
        StatusReport {
            outcome: change.decision.into(),
            message: Some(change.message),
        }
    }

    /// Replay buffered events for a correlation id that just became known. Returns how many
    /// were applied.
    async fn replay_buffered(&self, correlation_id: &str) -> usize {
        let mut applied = 0;
        for event in self.buffer.take(correlation_id) {
            match self.store.apply_status(&event).await {
                Ok(Some(change)) => {
                    if self.finish_status(&event, change).outcome == StatusOutcome::Applied {
                        applied += 1;
                    }
                }
                Ok(None) => {
                    tracing::warn!(correlation_id = %correlation_id, "Buffered status lost its message");
                }
                Err(e) => {
                    tracing::error!(error = %e, correlation_id = %correlation_id, "Buffered status replay failed");
                }
            }
        }
        applied
    }

    fn spawn_enrichment(self: &Arc<Self>, outcome: &AppendOutcome) {
        if !self.settings.ai_sentiment_enabled && !self.settings.ai_auto_reply_enabled {
            return;
        }
        let service = Arc::clone(self);
        let outcome = outcome.clone();
        tokio::spawn(async move { service.enrich(outcome).await });
    }

    /// AI enrichment for a freshly ingested inbound message. Failures are logged and skipped.
    async fn enrich(&self, mut outcome: AppendOutcome) {
        let Some(text) = outcome.message.text().map(str::to_string) else {
            return;
        };

        if self.settings.ai_sentiment_enabled {
            match self.classify(&outcome.message, &text).await {
                Ok(change) => {
                    if change.rolled_up {
                        self.notifier
                            .publish(ChangeEvent::conversation_updated(&change.conversation));
                    }
                    outcome.message = change.message;
                    outcome.conversation = change.conversation;
                }
                Err(e) => {
                    tracing::warn!(error = %e, message_id = %outcome.message.id, "Sentiment enrichment skipped");
                }
            }
        }

        if self.settings.ai_auto_reply_enabled {
            if let Err(e) = self.auto_reply(&outcome.conversation, &outcome.message, &text).await {
                tracing::warn!(error = %e, phone = %outcome.lead.phone, "Auto-reply skipped");
            }
        }
    }

    async fn classify(&self, message: &Message, text: &str) -> Result<SentimentChange> {
        let classification = tokio::time::timeout(
            self.settings.ai_timeout,
            classify_sentiment(self.llm.as_ref(), text),
        )
        .await
        .map_err(|_| Error::ExternalService("Sentiment classification timed out".to_string()))?
        .map_err(|e| Error::ExternalService(e.to_string()))?;

        let label = SentimentLabel::from_str(&classification.label)?;
        self.store
            .record_sentiment(message.id, label, classification.confidence)
            .await
    }

    async fn auto_reply(
        &self,
        conversation: &Conversation,
        message: &Message,
        text: &str,
    ) -> Result<()> {
        let history: Vec<String> = self
            .store
            .recent_messages(conversation.id, REPLY_CONTEXT_MESSAGES)
            .await?
            .iter()
            .filter(|m| m.id != message.id)
            .filter_map(|m| {
                let who = match m.direction {
                    Direction::Inbound => "Customer",
                    Direction::Outbound => "Agent",
                };
                m.text().map(|t| format!("{}: {}", who, t))
            })
            .collect();

        let reply = tokio::time::timeout(
            self.settings.ai_timeout,
            draft_reply(self.llm.as_ref(), text, &history),
        )
        .await
        .map_err(|_| Error::ExternalService("Reply drafting timed out".to_string()))?
        .map_err(|e| Error::ExternalService(e.to_string()))?;

        self.send(SendMessage {
            phone: conversation.phone.clone(),
            channel: Some(conversation.channel.clone()),
            sender: SenderRole::System,
            content: Some(reply),
            media: None,
            template: None,
        })
        .await?;
        Ok(())
    }

    /// Newest-first history page for a phone
    pub async fn history(
        &self,
        phone: &str,
        limit: i64,
        cursor: Option<&str>,
    ) -> Result<HistoryPage> {
        let phone = normalize_phone(phone)?;
        let cursor = cursor.map(HistoryCursor::decode).transpose()?;
        let limit = limit.clamp(1, MAX_LIMIT);
        let rows = self.store.history(&phone, limit + 1, cursor).await?;
        Ok(HistoryPage::from_rows(rows, limit))
    }

    pub async fn get_lead(&self, phone: &str) -> Result<Option<Lead>> {
        let phone = normalize_phone(phone)?;
        self.store.get_lead(&phone).await
    }

    pub async fn list_leads(
        &self,
        status: Option<LeadStatus>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Lead>> {
        self.store.list_leads(status, offset, limit).await
    }

    pub async fn update_lead(&self, phone: &str, update: LeadUpdate) -> Result<Lead> {
        let phone = normalize_phone(phone)?;
        if update.is_empty() {
            return Err(Error::Validation("No fields to update".to_string()));
        }
        let lead = self
            .store
            .update_lead(&phone, &update)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Lead {} not found", phone)))?;

        tracing::info!(phone = %lead.phone, status = %lead.status, "Lead updated");
        self.notifier.publish(ChangeEvent::lead_updated(&lead));
        Ok(lead)
    }

    pub async fn delete_lead(&self, phone: &str) -> Result<bool> {
        let phone = normalize_phone(phone)?;
        let deleted = self.store.delete_lead(&phone).await?;
        if deleted {
            tracing::info!(phone = %phone, "Lead deleted");
        }
        Ok(deleted)
    }

    pub async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        self.store.get_conversation(id).await
    }

    pub async fn list_conversations(&self, phone: &str) -> Result<Vec<Conversation>> {
        let phone = normalize_phone(phone)?;
        self.store.list_conversations(&phone).await
    }

    pub async fn transition_conversation(
        &self,
        id: Uuid,
        event: ConversationEvent,
    ) -> Result<Conversation> {
        let conversation = self.store.transition_conversation(id, event).await?;
        tracing::info!(
            conversation_id = %id,
            event = %event,
            status = %conversation.status,
            "Conversation transitioned"
        );
        self.notifier
            .publish(ChangeEvent::conversation_updated(&conversation));
        Ok(conversation)
    }

    /// Recompute a conversation's counters from the ledger
    pub async fn reconcile(&self, id: Uuid) -> Result<(Conversation, bool)> {
        let (conversation, changed) = self.store.reconcile(id).await?;
        if changed {
            tracing::warn!(
                conversation_id = %id,
                message_count = conversation.message_count,
                "Conversation summary drifted and was repaired"
            );
            self.notifier
                .publish(ChangeEvent::conversation_updated(&conversation));
        }
        Ok((conversation, changed))
    }

    /// Stats for one phone; an unknown phone yields an all-zero entry
    pub async fn lead_stats(&self, phone: &str) -> Result<LeadStats> {
        let phone = normalize_phone(phone)?;
        let rows = self.store.message_counts(Some(&phone)).await?;
        Ok(rows
            .first()
            .map(|row| LeadStats::from_counts(Some(phone.clone()), row))
            .unwrap_or_else(|| LeadStats::empty(&phone)))
    }

    pub async fn stats(&self) -> Result<StatsReport> {
        let rows = self.store.message_counts(None).await?;
        Ok(StatsReport::from_rows(&rows))
    }

    pub async fn sentiment_summary(&self, phone: &str) -> Result<SentimentSummary> {
        let phone = normalize_phone(phone)?;
        let records = self.store.recent_sentiments(&phone, SENTIMENT_WINDOW).await?;
        Ok(SentimentSummary::from_records(&phone, &records))
    }
}
