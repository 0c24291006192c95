pub mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("failed to send request to LLM API: {0}")]
    Request(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse LLM API response: {0}")]
    Decode(String),

    #[error("LLM returned no candidates: {0}")]
    Empty(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }
}

/// Sampling settings plus the output mode: a JSON schema constrains the reply
/// to a declared shape, no schema means plain text.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
    pub response_schema: Option<serde_json::Value>,
}

impl GenerationConfig {
    pub fn structured(schema: serde_json::Value) -> Self {
        Self {
            temperature: 0.25,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            response_mime_type: "application/json".into(),
            response_schema: Some(schema),
        }
    }

    pub fn free_text() -> Self {
        Self {
            temperature: 1.0,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".into(),
            response_schema: None,
        }
    }

    pub fn is_structured(&self) -> bool {
        self.response_schema.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: Option<String>,
    pub history: Vec<Turn>,
    pub message: String,
    pub config: GenerationConfig,
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, LlmError>;
}
