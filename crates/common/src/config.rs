//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables (optionally seeded from a `.env`
//! file). Collaborator crates (gateway, llm) load their own settings the same way.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which ledger backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreProvider {
    Postgres,
    Memory,
}

impl FromStr for StoreProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown STORE_PROVIDER '{}'. Supported providers: postgres, memory",
                other
            )),
        }
    }
}

/// What to do with a status callback whose correlation id is not in the ledger yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownStatusPolicy {
    /// Drop the event and report it as not found
    Discard,
    /// Hold the event for a bounded window and replay it once the message appears
    Buffer,
}

impl FromStr for UnknownStatusPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "discard" => Ok(Self::Discard),
            "buffer" => Ok(Self::Buffer),
            other => Err(anyhow::anyhow!(
                "Unknown UNKNOWN_STATUS_POLICY '{}'. Supported policies: discard, buffer",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Ledger backend
    pub store_provider: StoreProvider,

    /// Database connection URL, required for the postgres provider
    pub database_url: Option<String>,

    /// Channel assigned to events that do not name one
    pub default_channel: String,

    /// Status-event handling for unknown correlation ids
    pub unknown_status_policy: UnknownStatusPolicy,
    pub status_buffer_ttl_secs: u64,
    pub status_buffer_capacity: usize,

    /// Change notifier broadcast capacity
    pub notifier_capacity: usize,

    /// AI enrichment
    pub ai_sentiment_enabled: bool,
    pub ai_auto_reply_enabled: bool,
    pub ai_timeout_ms: u64,

    /// Runtime configuration
    pub rust_log: String,
    pub log_format: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        let store_provider: StoreProvider = env_or("STORE_PROVIDER", "postgres").parse()?;
        let database_url = env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        if store_provider == StoreProvider::Postgres && database_url.is_none() {
            return Err(anyhow::anyhow!(
                "DATABASE_URL is required when STORE_PROVIDER=postgres"
            ));
        }

        let default_channel = env_or("DEFAULT_CHANNEL", "whatsapp").to_ascii_lowercase();
        if default_channel.trim().is_empty() {
            return Err(anyhow::anyhow!("DEFAULT_CHANNEL cannot be empty"));
        }

        let config = Self {
            store_provider,
            database_url,
            default_channel,
            unknown_status_policy: env_or("UNKNOWN_STATUS_POLICY", "discard").parse()?,
            status_buffer_ttl_secs: parse_env("STATUS_BUFFER_TTL_SECS", 300)?,
            status_buffer_capacity: parse_env("STATUS_BUFFER_CAPACITY", 1000)?,
            notifier_capacity: parse_env("NOTIFIER_CAPACITY", 1024)?,
            ai_sentiment_enabled: parse_env("AI_SENTIMENT_ENABLED", false)?,
            ai_auto_reply_enabled: parse_env("AI_AUTO_REPLY_ENABLED", false)?,
            ai_timeout_ms: parse_env("AI_TIMEOUT_MS", 10_000)?,
            rust_log: env_or("RUST_LOG", "leadline=info"),
            log_format: env_or("LOG_FORMAT", "pretty"),
            port: parse_env("PORT", 3000)?,
        };

        if config.notifier_capacity == 0 {
            return Err(anyhow::anyhow!("NOTIFIER_CAPACITY must be at least 1"));
        }

        Ok(config)
    }

    /// Configuration for tests and local runs against the in-memory store
    pub fn in_memory() -> Self {
        Self {
            store_provider: StoreProvider::Memory,
            database_url: None,
            default_channel: "whatsapp".to_string(),
            unknown_status_policy: UnknownStatusPolicy::Discard,
            status_buffer_ttl_secs: 300,
            status_buffer_capacity: 1000,
            notifier_capacity: 1024,
            ai_sentiment_enabled: false,
            ai_auto_reply_enabled: false,
            ai_timeout_ms: 10_000,
            rust_log: "leadline=debug".to_string(),
            log_format: "pretty".to_string(),
            port: 3000,
        }
    }

    pub fn status_buffer_ttl(&self) -> Duration {
        Duration::from_secs(self.status_buffer_ttl_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}
