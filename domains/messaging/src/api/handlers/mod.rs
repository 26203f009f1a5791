pub mod analytics;
pub mod conversations;
pub mod events;
pub mod leads;
pub mod messages;
pub mod webhooks;
