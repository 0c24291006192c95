use serde::Deserialize;

/// Webhook request body: `{"destination": ..., "events": [...]}`.
#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub message: Option<EventMessage>,
    #[serde(default)]
    pub delivery_context: Option<DeliveryContext>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    #[serde(default)]
    pub is_redelivery: bool,
}

/// A text message event that can be answered: it carries both text and a
/// reply token.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMessageEvent {
    pub event_id: Option<String>,
    pub message_id: Option<String>,
    pub reply_token: String,
    pub text: String,
    pub is_redelivery: bool,
}

impl WebhookBody {
    pub fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    pub fn text_messages(&self) -> Vec<TextMessageEvent> {
        self.events.iter().filter_map(WebhookEvent::as_text_message).collect()
    }
}

impl WebhookEvent {
    fn as_text_message(&self) -> Option<TextMessageEvent> {
        if self.event_type != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.message_type != "text" {
            return None;
        }
        Some(TextMessageEvent {
            event_id: self.webhook_event_id.clone(),
            message_id: message.id.clone(),
            reply_token: self.reply_token.clone()?,
            text: message.text.clone()?,
            is_redelivery: self
                .delivery_context
                .as_ref()
                .is_some_and(|c| c.is_redelivery),
        })
    }
}
