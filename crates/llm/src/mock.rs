//! Mock LLM Service
//!
//! Used by `LlmServiceFactory` when provider is `"mock"`. With nothing scripted it classifies
//! text with a small keyword heuristic and echoes a canned reply, so local runs produce
//! plausible enrichment without network access.

use crate::{CompletionRequest, CompletionResponse, LlmError, LlmService};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Scripted result for the next completion
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Text(String),
    Fail(String),
    /// Never answer; exercises caller timeouts
    Hang,
}

/// Mock LLM service with scripted replies and request recording
#[derive(Debug, Clone, Default)]
pub struct MockLlmService {
    script: Arc<Mutex<VecDeque<MockReply>>>,
    history: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl MockLlmService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next completion call
    pub fn push_reply(&self, reply: MockReply) {
        self.script.lock().unwrap().push_back(reply);
    }

    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.history.lock().unwrap().clone()
    }
}

fn heuristic_content(request: &CompletionRequest) -> String {
    let last = request
        .messages
        .last()
        .map(|m| m.content.to_lowercase())
        .unwrap_or_default();
    let wants_sentiment = request
        .system_prompt
        .as_deref()
        .is_some_and(|p| p.contains("sentiment"));

    if wants_sentiment {
        let sentiment = if ["thank", "great", "love", "perfect", "good"]
            .iter()
            .any(|w| last.contains(w))
        {
            "positive"
        } else if ["bad", "angry", "terrible", "refund", "worst"]
            .iter()
            .any(|w| last.contains(w))
        {
            "negative"
        } else {
            "neutral"
        };
        format!(r#"{{"sentiment": "{}", "confidence": 0.8}}"#, sentiment)
    } else {
        "Thanks for your message. A member of our team will follow up shortly.".to_string()
    }
}

#[async_trait::async_trait]
impl LlmService for MockLlmService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        tracing::info!("Mock LLM service processing completion request");
        self.history.lock().unwrap().push(request.clone());

        let scripted = self.script.lock().unwrap().pop_front();
        let content = match scripted {
            Some(MockReply::Text(text)) => text,
            Some(MockReply::Fail(reason)) => return Err(LlmError::Response(reason)),
            Some(MockReply::Hang) => {
                std::future::pending::<()>().await;
                return Err(LlmError::Request("unreachable".to_string()));
            }
            None => heuristic_content(&request),
        };

        let model = if request.model.is_empty() {
            "mock-model".to_string()
        } else {
            request.model
        };
        let input_tokens = request
            .messages
            .iter()
            .map(|m| m.content.len() as i32 / 4)
            .sum::<i32>();
        let output_tokens = content.len() as i32 / 4;

        Ok(CompletionResponse {
            content,
            model,
            input_tokens,
            output_tokens,
            stop_reason: "end_turn".to_string(),
        })
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }
}
