//! HTTP Delivery Gateway Client
//!
//! POSTs Cloud-API style message bodies to `{base_url}/{sender_id}/messages` with a bearer
//! token and reads the gateway message id from `messages[0].id`.

use crate::{DeliveryGateway, GatewayConfig, GatewayError, SendReceipt, SendRequest};
use serde::Deserialize;
use serde_json::{json, Value};

/// Real HTTP client for a Cloud-API style messaging gateway.
pub struct HttpGateway {
    http: reqwest::Client,
    messages_url: String,
    access_token: String,
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let messages_url = format!(
            "{}/{}/messages",
            config.base_url.trim_end_matches('/'),
            config.sender_id
        );
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            messages_url,
            access_token: config.access_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    messages: Vec<MessageId>,
}

#[derive(Debug, Deserialize)]
struct MessageId {
    id: String,
}

/// Build the gateway request body. Template wins over media, media over plain text.
pub(crate) fn build_body(request: &SendRequest) -> Value {
    if let Some(template) = &request.template {
        return json!({
            "messaging_product": "whatsapp",
            "to": request.phone,
            "type": "template",
            "template": {
                "name": template.name,
                "language": { "code": template.language }
            }
        });
    }

    if let Some(media) = &request.media {
        let kind = media.kind.to_string();
        let mut object = json!({ "link": media.link });
        if let Some(caption) = media.caption.as_ref().or(request.content.as_ref()) {
            object["caption"] = json!(caption);
        }
        let mut body = json!({
            "messaging_product": "whatsapp",
            "to": request.phone,
            "type": kind,
        });
        body[kind.as_str()] = object;
        return body;
    }

    json!({
        "messaging_product": "whatsapp",
        "to": request.phone,
        "type": "text",
        "text": { "body": request.content.clone().unwrap_or_default() }
    })
}

#[async_trait::async_trait]
impl DeliveryGateway for HttpGateway {
    async fn send(&self, request: SendRequest) -> Result<SendReceipt, GatewayError> {
        request.validate()?;
        let body = build_body(&request);

        let response = self
            .http
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Request(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(GatewayError::Rejected(format!(
                "Gateway returned {}: {}",
                status, body
            )));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read response body".to_string());
            return Err(GatewayError::Response(format!(
                "Gateway returned {}: {}",
                status, body
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::Response(format!("Invalid gateway response: {}", e)))?;
        let correlation_id = parsed
            .messages
            .into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| GatewayError::Response("Gateway response has no message id".to_string()))?;

        tracing::debug!(correlation_id = %correlation_id, "Gateway accepted message");
        Ok(SendReceipt { correlation_id })
    }
}
