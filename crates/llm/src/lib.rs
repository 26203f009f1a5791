//! Leadline LLM Service
//!
//! Text-generation collaborator used for optional message enrichment:
//! - Anthropic Messages API integration for production
//! - Programmable mock for testing and development
//! - Sentiment classification and reply drafting on top of `LlmService`

pub mod anthropic;
pub mod mock;
pub mod sentiment;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sentiment::{classify_sentiment, draft_reply, SentimentClassification};

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("LLM request error: {0}")]
    Request(String),

    #[error("LLM response error: {0}")]
    Response(String),

    #[error("LLM rate limit exceeded")]
    RateLimit,
}

/// Speaker of a message in a completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// Model id; empty means the service default
    pub model: String,
    pub system_prompt: Option<String>,
    pub messages: Vec<LlmMessage>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub stop_reason: String,
}

/// LLM service configuration
#[derive(Clone)]
pub struct LlmConfig {
    /// LLM provider (anthropic, mock)
    pub provider: String,
    pub api_key: String,
    pub default_model: String,
    pub max_tokens: u32,
    /// Override for the provider API base URL
    pub base_url: Option<String>,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[REDACTED]")
            .field("default_model", &self.default_model)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl LlmConfig {
    /// Create LLM config from environment variables
    pub fn from_env() -> Result<Self, LlmError> {
        let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let default_model = std::env::var("LLM_DEFAULT_MODEL")
            .unwrap_or_else(|_| "claude-3-5-haiku-latest".to_string());
        let max_tokens = match std::env::var("LLM_MAX_TOKENS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                LlmError::Configuration(format!("LLM_MAX_TOKENS is not a number: {}", raw))
            })?,
            Err(_) => 512,
        };
        let base_url = std::env::var("LLM_BASE_URL").ok().filter(|u| !u.is_empty());

        if provider == "anthropic" && api_key.is_empty() {
            return Err(LlmError::Configuration(
                "ANTHROPIC_API_KEY is required for the anthropic provider".to_string(),
            ));
        }

        Ok(Self {
            provider,
            api_key,
            default_model,
            max_tokens,
            base_url,
        })
    }

    pub fn mock() -> Self {
        Self {
            provider: "mock".to_string(),
            api_key: String::new(),
            default_model: "mock-model".to_string(),
            max_tokens: 512,
            base_url: None,
        }
    }
}

/// Text-generation service
#[async_trait::async_trait]
pub trait LlmService: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    fn default_model(&self) -> &str;
}

/// Factory for creating LlmService implementations
pub struct LlmServiceFactory;

impl LlmServiceFactory {
    pub fn create(config: LlmConfig) -> Result<Box<dyn LlmService>, LlmError> {
        match config.provider.as_str() {
            "anthropic" => {
                tracing::info!(model = %config.default_model, "Creating Anthropic LLM service");
                if config.api_key.is_empty() {
                    return Err(LlmError::Configuration(
                        "ANTHROPIC_API_KEY is required for the anthropic provider".to_string(),
                    ));
                }
                Ok(Box::new(anthropic::AnthropicService::new(config)))
            }
            "mock" => {
                tracing::info!("Creating mock LLM service");
                Ok(Box::new(mock::MockLlmService::new()))
            }
            provider => Err(LlmError::Configuration(format!(
                "Unknown LLM provider: {}. Supported providers: anthropic, mock",
                provider
            ))),
        }
    }
}
