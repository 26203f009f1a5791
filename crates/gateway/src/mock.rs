//! Mock Delivery Gateway
//!
//! Programmable mock for testing outbound delivery:
//! - `MockGateway`: configurable mock with request recording
//! - `MockGatewayBehavior`: controls outcome, delay and the next correlation id
//! - `MockOutcome`: Accept, Reject, or Hang

use crate::{DeliveryGateway, GatewayError, SendReceipt, SendRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// What outcome the mock should produce
#[derive(Debug, Clone, Default, PartialEq)]
pub enum MockOutcome {
    /// Accept the message and return a correlation id
    #[default]
    Accept,
    /// Reject the message with the given reason
    Reject(String),
    /// Never answer (simulates an unresponsive gateway)
    Hang,
}

/// Programmable behavior for the mock gateway
#[derive(Debug, Clone, Default)]
pub struct MockGatewayBehavior {
    pub outcome: Arc<RwLock<MockOutcome>>,
    pub delay_ms: Arc<RwLock<u64>>,
    pub correlation_ids: Arc<RwLock<VecDeque<String>>>,
}

impl MockGatewayBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_outcome(&self, outcome: MockOutcome) {
        *self.outcome.write().unwrap() = outcome;
    }

    pub fn set_delay_ms(&self, delay: u64) {
        *self.delay_ms.write().unwrap() = delay;
    }

    /// Queue a correlation id for the next accepted send. Unqueued sends get `mock-<uuid>`.
    pub fn push_correlation_id(&self, id: impl Into<String>) {
        self.correlation_ids.write().unwrap().push_back(id.into());
    }

    pub fn reset(&self) {
        *self.outcome.write().unwrap() = MockOutcome::Accept;
        *self.delay_ms.write().unwrap() = 0;
        self.correlation_ids.write().unwrap().clear();
    }

    pub fn get_outcome(&self) -> MockOutcome {
        self.outcome.read().unwrap().clone()
    }

    pub fn get_delay_ms(&self) -> u64 {
        *self.delay_ms.read().unwrap()
    }

    fn next_correlation_id(&self) -> String {
        self.correlation_ids
            .write()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| format!("mock-{}", uuid::Uuid::new_v4()))
    }
}

/// Mock gateway with programmable behavior
#[derive(Debug, Clone, Default)]
pub struct MockGateway {
    behavior: Arc<MockGatewayBehavior>,
    history: Arc<Mutex<Vec<SendRequest>>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: Arc<MockGatewayBehavior>) -> Self {
        Self {
            behavior,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared behavior handle for test configuration
    pub fn behavior(&self) -> &Arc<MockGatewayBehavior> {
        &self.behavior
    }

    pub fn recorded_requests(&self) -> Vec<SendRequest> {
        self.history.lock().unwrap().clone()
    }

    pub fn reset_history(&self) {
        self.history.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl DeliveryGateway for MockGateway {
    async fn send(&self, request: SendRequest) -> Result<SendReceipt, GatewayError> {
        request.validate()?;
        tracing::info!(phone = %request.phone, "Mock gateway: received send request");
        self.history.lock().unwrap().push(request);

        let delay_ms = self.behavior.get_delay_ms();
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }

        match self.behavior.get_outcome() {
            MockOutcome::Accept => Ok(SendReceipt {
                correlation_id: self.behavior.next_correlation_id(),
            }),
            MockOutcome::Reject(reason) => Err(GatewayError::Rejected(reason)),
            MockOutcome::Hang => {
                tracing::info!("Mock gateway: simulating unresponsive gateway");
                std::future::pending::<()>().await;
                Err(GatewayError::Request("unreachable".to_string()))
            }
        }
    }
}
