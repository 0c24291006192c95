use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::error::RelayError;

/// Upper bound LINE accepts for a single text message.
pub const MAX_TEXT_CHARS: usize = 5000;

#[async_trait]
pub trait MessagingApi: Send + Sync {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), RelayError>;

    async fn set_webhook_endpoint(&self, endpoint: &str) -> Result<(), RelayError>;
}

pub struct LineClient {
    client: reqwest::Client,
    access_token: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyMessageRequest<'a> {
    reply_token: &'a str,
    messages: Vec<TextMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    message_type: &'static str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct WebhookEndpointRequest<'a> {
    endpoint: &'a str,
}

impl LineClient {
    pub fn new(access_token: &str, api_base: &str, timeout: Duration) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::ReplyFailed(e.to_string()))?;
        Ok(Self {
            client,
            access_token: access_token.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<(), String> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(format!("LINE API error ({}): {}", status, body))
    }
}

#[async_trait]
impl MessagingApi for LineClient {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), RelayError> {
        let request = ReplyMessageRequest {
            reply_token,
            messages: vec![TextMessage {
                message_type: "text",
                text: truncate_chars(text, MAX_TEXT_CHARS),
            }],
        };

        let response = self
            .client
            .post(format!("{}/v2/bot/message/reply", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::ReplyFailed(e.to_string()))?;

        Self::check(response).await.map_err(RelayError::ReplyFailed)?;
        debug!(chars = text.chars().count(), "reply sent");
        Ok(())
    }

    async fn set_webhook_endpoint(&self, endpoint: &str) -> Result<(), RelayError> {
        let response = self
            .client
            .put(format!("{}/v2/bot/channel/webhook/endpoint", self.api_base))
            .bearer_auth(&self.access_token)
            .json(&WebhookEndpointRequest { endpoint })
            .send()
            .await
            .map_err(|e| RelayError::RegistrationFailed(e.to_string()))?;

        Self::check(response)
            .await
            .map_err(RelayError::RegistrationFailed)
    }
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
