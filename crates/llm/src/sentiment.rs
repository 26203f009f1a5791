//! Enrichment helpers built on `LlmService`

use serde::Deserialize;

use crate::{CompletionRequest, LlmError, LlmMessage, LlmService};

/// Labels a classification may return
pub const SENTIMENT_LABELS: [&str; 4] = ["positive", "negative", "neutral", "mixed"];

const SENTIMENT_PROMPT: &str = "You analyze the sentiment of customer messages. \
Respond with only a JSON object of the form {\"sentiment\": \"positive\" | \"negative\" | \
\"neutral\" | \"mixed\", \"confidence\": <number between 0 and 1>}.";

const REPLY_PROMPT: &str =
    "You are a helpful customer support agent. Keep responses concise and professional.";

/// Number of history lines included in a reply prompt
const REPLY_HISTORY_LINES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct SentimentClassification {
    /// One of `SENTIMENT_LABELS`
    pub label: String,
    /// Clamped to [0, 1]
    pub confidence: f64,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    sentiment: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Pull the first JSON object out of model output (models like to wrap it in prose or fences)
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub(crate) fn parse_classification(text: &str) -> Result<SentimentClassification, LlmError> {
    let json = extract_json_object(text)
        .ok_or_else(|| LlmError::Response("No JSON object in sentiment response".to_string()))?;
    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| LlmError::Response(format!("Invalid sentiment response: {}", e)))?;

    let label = raw.sentiment.trim().to_ascii_lowercase();
    if !SENTIMENT_LABELS.contains(&label.as_str()) {
        return Err(LlmError::Response(format!(
            "Unknown sentiment label: {}",
            raw.sentiment
        )));
    }

    let confidence = raw.confidence.unwrap_or(0.5);
    let confidence = if confidence.is_finite() {
        confidence.clamp(0.0, 1.0)
    } else {
        0.5
    };

    Ok(SentimentClassification { label, confidence })
}

/// Classify the sentiment of a single message
pub async fn classify_sentiment(
    service: &dyn LlmService,
    text: &str,
) -> Result<SentimentClassification, LlmError> {
    let request = CompletionRequest {
        model: String::new(),
        system_prompt: Some(SENTIMENT_PROMPT.to_string()),
        messages: vec![LlmMessage::user(format!("Message: {}", text))],
        max_tokens: Some(100),
    };
    let response = service.complete(request).await?;
    parse_classification(&response.content)
}

/// Draft a support reply to `text`, given prior conversation lines (oldest first)
pub async fn draft_reply(
    service: &dyn LlmService,
    text: &str,
    history: &[String],
) -> Result<String, LlmError> {
    let skip = history.len().saturating_sub(REPLY_HISTORY_LINES);
    let context = history[skip..].join("\n");

    let prompt = if context.is_empty() {
        format!("Customer message: {}\n\nReply:", text)
    } else {
        format!(
            "Conversation so far:\n{}\n\nCustomer message: {}\n\nReply:",
            context, text
        )
    };

    let request = CompletionRequest {
        model: String::new(),
        system_prompt: Some(REPLY_PROMPT.to_string()),
        messages: vec![LlmMessage::user(prompt)],
        max_tokens: None,
    };
    let response = service.complete(request).await?;
    let reply = response.content.trim().to_string();
    if reply.is_empty() {
        return Err(LlmError::Response("Empty reply".to_string()));
    }
    Ok(reply)
}
