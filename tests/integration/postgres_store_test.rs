//! Postgres store tests
//!
//! Run against a disposable database:
//! `TEST_DATABASE_URL=postgres://... cargo test -p leadline-integration-tests -- --ignored`

#![allow(dead_code)]

mod common;

use chrono::{DateTime, Utc};
use serial_test::serial;
use sqlx::PgPool;
use uuid::Uuid;

use leadline_common::Error;
use leadline_messaging::{
    ConversationEvent, ConversationStatus, DeliveryStatus, Direction, MessagingRepositories,
    MessagingStore, NewMessage, SenderRole, SentimentLabel, StatusDecision, StatusEvent,
};

use common::{test_database_url, T0};

async fn store() -> MessagingRepositories {
    let url = test_database_url().expect("TEST_DATABASE_URL must be set for Postgres tests");
    let pool = PgPool::connect(&url).await.unwrap();
    sqlx::migrate!("../../migrations").run(&pool).await.unwrap();
    MessagingRepositories::new(pool)
}

/// A phone no other test uses
fn unique_phone() -> String {
    format!("1555{:07}", Uuid::new_v4().as_u128() % 10_000_000)
}

fn unique_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn at(offset: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(T0 + offset, 0).unwrap()
}

fn inbound(phone: &str, content: &str, correlation_id: Option<String>, offset: i64) -> NewMessage {
    NewMessage::new(
        phone,
        "whatsapp".to_string(),
        Direction::Inbound,
        SenderRole::Lead,
        Some(content.to_string()),
        None,
        correlation_id,
        Some(at(offset)),
    )
    .unwrap()
}

fn outbound(phone: &str, correlation_id: Option<String>, offset: i64) -> NewMessage {
    NewMessage::new(
        phone,
        "whatsapp".to_string(),
        Direction::Outbound,
        SenderRole::Agent,
        Some("Hello from the team".to_string()),
        None,
        correlation_id,
        Some(at(offset)),
    )
    .unwrap()
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_append_is_idempotent() {
    let store = store().await;
    let phone = unique_phone();
    let cid = unique_id("Y1");

    let first = store
        .append(&inbound(&phone, "Hello", Some(cid.clone()), 0))
        .await
        .unwrap();
    let second = store
        .append(&inbound(&phone, "Hello", Some(cid.clone()), 0))
        .await
        .unwrap();

    assert!(!first.duplicate);
    assert!(first.lead_created);
    assert!(second.duplicate);
    assert_eq!(second.message.id, first.message.id);
    assert_eq!(second.conversation.message_count, 1);
    assert_eq!(first.message.created_at, at(0));

    store.delete_lead(&phone).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_concurrent_appends_share_lead_and_conversation() {
    let store = std::sync::Arc::new(store().await);
    let phone = unique_phone();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let store = store.clone();
            let new = inbound(&phone, "Hi", Some(unique_id("in")), i);
            tokio::spawn(async move { store.append(&new).await.unwrap() })
        })
        .collect();

    let mut created = 0;
    let mut lead_ids = Vec::new();
    let mut conversation_ids = Vec::new();
    for handle in handles {
        let outcome = handle.await.unwrap();
        if outcome.lead_created {
            created += 1;
        }
        lead_ids.push(outcome.lead.id);
        conversation_ids.push(outcome.conversation.id);
    }
    lead_ids.dedup();
    conversation_ids.dedup();

    assert_eq!(created, 1);
    assert_eq!(lead_ids.len(), 1);
    assert_eq!(conversation_ids.len(), 1);

    let conversation = store
        .get_conversation(conversation_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.message_count, 10);
    assert_eq!(conversation.last_message_at, Some(at(9)));

    store.delete_lead(&phone).await.unwrap();
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_status_progression_ignores_stale_events() {
    let store = store().await;
    let phone = unique_phone();
    let cid = unique_id("X1");
    store.append(&outbound(&phone, Some(cid.clone()), 0)).await.unwrap();

    let event = |status, offset| StatusEvent::new(&cid, status, at(offset)).unwrap();

    let delivered = store
        .apply_status(&event(DeliveryStatus::Delivered, 10))
        .await
        .unwrap()
        .unwrap();
    let stale = store
        .apply_status(&event(DeliveryStatus::Sent, 5))
        .await
        .unwrap()
        .unwrap();
    let read = store
        .apply_status(&event(DeliveryStatus::Read, 20))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(delivered.decision, StatusDecision::Apply);
    assert_eq!(stale.decision, StatusDecision::Stale);
    assert_eq!(read.decision, StatusDecision::Apply);
    assert_eq!(read.message.status, DeliveryStatus::Read);
    assert_eq!(read.message.status_at, Some(at(20)));

    let unknown = store
        .apply_status(&StatusEvent::new(&unique_id("nope"), DeliveryStatus::Read, at(1)).unwrap())
        .await
        .unwrap();
    assert!(unknown.is_none());

    store.delete_lead(&phone).await.unwrap();
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_assign_correlation_conflict() {
    let store = store().await;
    let phone = unique_phone();
    let cid = unique_id("S1");

    let a = store.append(&outbound(&phone, None, 0)).await.unwrap();
    let b = store.append(&outbound(&phone, None, 1)).await.unwrap();

    let assigned = store.assign_correlation(a.message.id, &cid).await.unwrap();
    assert_eq!(assigned.correlation_id.as_deref(), Some(cid.as_str()));

    let err = store.assign_correlation(b.message.id, &cid).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let failed = store
        .fail_message(b.message.id, Some("timeout"), "Gateway did not respond")
        .await
        .unwrap();
    assert_eq!(failed.message.status, DeliveryStatus::Failed);
    assert_eq!(failed.message.error_code.as_deref(), Some("timeout"));

    store.delete_lead(&phone).await.unwrap();
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_archive_opens_new_conversation_and_blocks_unarchive() {
    let store = store().await;
    let phone = unique_phone();

    let first = store.append(&inbound(&phone, "One", None, 0)).await.unwrap();
    let archived = store
        .transition_conversation(first.conversation.id, ConversationEvent::Archive)
        .await
        .unwrap();
    assert_eq!(archived.status, ConversationStatus::Archived);

    let second = store.append(&inbound(&phone, "Two", None, 10)).await.unwrap();
    assert_ne!(second.conversation.id, first.conversation.id);
    assert_eq!(second.conversation.message_count, 1);

    let err = store
        .transition_conversation(first.conversation.id, ConversationEvent::Unarchive)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    store.delete_lead(&phone).await.unwrap();
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_reconcile_repairs_counters() {
    let store = store().await;
    let phone = unique_phone();

    let first = store.append(&inbound(&phone, "One", None, 0)).await.unwrap();
    store.append(&inbound(&phone, "Two", None, 30)).await.unwrap();
    let id = first.conversation.id;

    sqlx::query("UPDATE conversations SET message_count = 9, last_message_at = NULL WHERE id = $1")
        .bind(id)
        .execute(store.pool())
        .await
        .unwrap();

    let (conversation, changed) = store.reconcile(id).await.unwrap();
    assert!(changed);
    assert_eq!(conversation.message_count, 2);
    assert_eq!(conversation.last_message_at, Some(at(30)));

    let (_, again) = store.reconcile(id).await.unwrap();
    assert!(!again);

    store.delete_lead(&phone).await.unwrap();
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_sentiment_rollup_is_last_write_wins_by_creation() {
    let store = store().await;
    let phone = unique_phone();

    let early = store.append(&inbound(&phone, "Bad", None, 0)).await.unwrap();
    let late = store.append(&inbound(&phone, "Good", None, 10)).await.unwrap();

    let newer = store
        .record_sentiment(late.message.id, SentimentLabel::Positive, 0.9)
        .await
        .unwrap();
    assert!(newer.rolled_up);

    let older = store
        .record_sentiment(early.message.id, SentimentLabel::Negative, 0.8)
        .await
        .unwrap();
    assert!(!older.rolled_up);
    assert_eq!(older.conversation.sentiment, Some(SentimentLabel::Positive));

    let records = store.recent_sentiments(&phone, 50).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].label, SentimentLabel::Negative);

    store.delete_lead(&phone).await.unwrap();
}

#[tokio::test]
#[ignore = "requires TEST_DATABASE_URL"]
#[serial]
async fn test_history_paging_and_counts() {
    let store = store().await;
    let phone = unique_phone();

    for i in 0..3 {
        store
            .append(&outbound(&phone, Some(unique_id("h")), i))
            .await
            .unwrap();
    }
    let cid = unique_id("d");
    store.append(&outbound(&phone, Some(cid.clone()), 3)).await.unwrap();
    store
        .apply_status(&StatusEvent::new(&cid, DeliveryStatus::Delivered, at(4)).unwrap())
        .await
        .unwrap();

    let page = store.history(&phone, 2, None).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].created_at, at(3));

    let cursor = leadline_messaging::HistoryCursor::after(&page[1]);
    let rest = store.history(&phone, 10, Some(cursor)).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[1].created_at, at(0));

    let counts = store.message_counts(Some(&phone)).await.unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].outbound_count, 4);
    assert_eq!(counts[0].delivered_count, 1);

    assert!(store.delete_lead(&phone).await.unwrap());
    assert!(store.history(&phone, 10, None).await.unwrap().is_empty());
}
