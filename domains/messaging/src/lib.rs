//! Messaging domain: leads, conversations, message ledger, delivery status, analytics, change feed

pub mod analytics;
pub mod api;
pub mod domain;
pub mod notifier;
pub mod pending;
pub mod repository;
pub mod service;

// Re-export domain types at the crate root for convenience
pub use domain::entities::{
    Conversation, ConversationStatus, DeliveryStatus, Direction, HistoryCursor, HistoryPage, Lead,
    LeadStatus, LeadUpdate, MediaDescriptor, Message, NewMessage, SenderRole, SentimentLabel,
    SentimentRecord, StatusEvent,
};
pub use domain::events::{ChangeEvent, EventKind, EventPayload};
pub use domain::state::{
    ConversationEvent, ConversationStateMachine, DeliveryStateMachine, StateError, StatusDecision,
    StatusOutcome,
};

// Re-export repository and service types
pub use notifier::{ChangeNotifier, Received, Subscription};
pub use repository::{MemoryStore, MessagingRepositories, MessagingStore};
pub use service::{MessagingService, MessagingSettings};

// Re-export API types
pub use api::routes;
pub use api::MessagingState;
