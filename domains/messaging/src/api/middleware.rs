//! Messaging domain state

use std::sync::Arc;

use crate::service::MessagingService;

/// Application state for the Messaging domain
#[derive(Clone)]
pub struct MessagingState {
    pub service: Arc<MessagingService>,
}

impl MessagingState {
    pub fn new(service: MessagingService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
