//! Leadline Delivery Gateway
//!
//! Boundary with the messaging gateway that actually delivers outbound messages:
//! - `DeliveryGateway` trait: accept a send request, return the gateway correlation id
//! - HTTP client for a Cloud-API style gateway
//! - Programmable mock for tests and local development
//! - `StatusCallback`: the asynchronous status report the gateway posts back

pub mod client;
pub mod mock;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Gateway configuration error: {0}")]
    Configuration(String),

    #[error("Gateway request error: {0}")]
    Request(String),

    #[error("Gateway rejected message: {0}")]
    Rejected(String),

    #[error("Gateway response error: {0}")]
    Response(String),
}

/// Media type of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Document => write!(f, "document"),
        }
    }
}

/// Reference to media the gateway should deliver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Reference to a pre-approved gateway template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en_US".to_string()
}

/// Outbound send request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRequest {
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<TemplateRef>,
}

impl SendRequest {
    /// Check that the request carries something to deliver
    pub fn validate(&self) -> Result<(), GatewayError> {
        if self.phone.trim().is_empty() {
            return Err(GatewayError::Request("phone is required".to_string()));
        }
        let has_text = self
            .content
            .as_deref()
            .is_some_and(|c| !c.trim().is_empty());
        if !has_text && self.media.is_none() && self.template.is_none() {
            return Err(GatewayError::Request(
                "one of content, media or template is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Gateway acknowledgement of an accepted send
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub correlation_id: String,
}

/// Timestamp as gateways report it: unix seconds or RFC 3339
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GatewayTimestamp {
    Unix(i64),
    Rfc3339(DateTime<Utc>),
}

impl GatewayTimestamp {
    pub fn to_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            GatewayTimestamp::Unix(secs) => Utc.timestamp_opt(secs, 0).single(),
            GatewayTimestamp::Rfc3339(dt) => Some(dt),
        }
    }
}

/// Asynchronous delivery-status callback posted by the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCallback {
    pub correlation_id: String,
    pub status: String,
    pub timestamp: GatewayTimestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Gateway configuration
#[derive(Clone)]
pub struct GatewayConfig {
    /// Gateway provider (http, mock)
    pub provider: String,
    pub base_url: String,
    pub access_token: String,
    /// Sender identity on the gateway (the business phone number id)
    pub sender_id: String,
    pub timeout_ms: u64,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("access_token", &"[REDACTED]")
            .field("sender_id", &self.sender_id)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl GatewayConfig {
    /// Create gateway config from environment variables
    pub fn from_env() -> Result<Self, GatewayError> {
        let provider = std::env::var("GATEWAY_PROVIDER").unwrap_or_else(|_| "mock".to_string());
        let base_url = std::env::var("GATEWAY_BASE_URL")
            .unwrap_or_else(|_| "https://graph.facebook.com/v18.0".to_string());
        let access_token = std::env::var("GATEWAY_ACCESS_TOKEN").unwrap_or_default();
        let sender_id = std::env::var("GATEWAY_SENDER_ID").unwrap_or_default();
        let timeout_ms = match std::env::var("GATEWAY_TIMEOUT_MS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                GatewayError::Configuration(format!("GATEWAY_TIMEOUT_MS is not a number: {}", raw))
            })?,
            Err(_) => 10_000,
        };

        if provider == "http" && (access_token.is_empty() || sender_id.is_empty()) {
            return Err(GatewayError::Configuration(
                "GATEWAY_ACCESS_TOKEN and GATEWAY_SENDER_ID are required for the http provider"
                    .to_string(),
            ));
        }

        Ok(Self {
            provider,
            base_url,
            access_token,
            sender_id,
            timeout_ms,
        })
    }

    pub fn mock() -> Self {
        Self {
            provider: "mock".to_string(),
            base_url: "http://localhost:0".to_string(),
            access_token: String::new(),
            sender_id: "mock-sender".to_string(),
            timeout_ms: 10_000,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Outbound delivery gateway
#[async_trait::async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// Hand a message to the gateway. Delivery status arrives later as a `StatusCallback`.
    async fn send(&self, request: SendRequest) -> Result<SendReceipt, GatewayError>;
}

/// Factory for creating DeliveryGateway implementations
pub struct GatewayFactory;

impl GatewayFactory {
    pub fn create(config: GatewayConfig) -> Result<Box<dyn DeliveryGateway>, GatewayError> {
        match config.provider.as_str() {
            "http" => {
                tracing::info!(base_url = %config.base_url, "Creating HTTP delivery gateway");
                if config.access_token.is_empty() || config.sender_id.is_empty() {
                    return Err(GatewayError::Configuration(
                        "access token and sender id are required for the http provider"
                            .to_string(),
                    ));
                }
                Ok(Box::new(client::HttpGateway::new(config)))
            }
            "mock" => {
                tracing::info!("Creating mock delivery gateway");
                Ok(Box::new(mock::MockGateway::new()))
            }
            provider => Err(GatewayError::Configuration(format!(
                "Unknown gateway provider: {}. Supported providers: http, mock",
                provider
            ))),
        }
    }
}
