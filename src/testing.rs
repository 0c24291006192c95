//! Fixture servers and deterministic provider fakes shared by unit tests.

use async_trait::async_trait;
use axum::Router;
use std::sync::Mutex;

use crate::error::RelayError;
use crate::line::MessagingApi;
use crate::llm::{GenerationRequest, LlmError, LlmProvider, LlmResponse};
use crate::retrieval::{SearchProvider, SearchResults};

/// Serves `app` on a loopback port and returns its base URL.
pub async fn spawn_fixture(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fixture port");
    let addr = listener.local_addr().expect("fixture local_addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fixture server");
    });
    format!("http://{}", addr)
}

/// Answers schema-mode requests with `answer` and free-text requests with
/// `summary`. `Err` values become provider failures.
pub struct FakeLlm {
    pub answer: Result<String, String>,
    pub summary: Result<String, String>,
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeLlm {
    pub fn new(answer: &str, summary: &str) -> Self {
        Self {
            answer: Ok(answer.to_string()),
            summary: Ok(summary.to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_summary(answer: &str) -> Self {
        Self {
            summary: Err("summary model overloaded".into()),
            ..Self::new(answer, "")
        }
    }

    pub fn failing_answer() -> Self {
        Self {
            answer: Err("answer model overloaded".into()),
            ..Self::new("", "")
        }
    }

    pub fn structured_calls(&self) -> usize {
        self.count(true)
    }

    pub fn free_text_calls(&self) -> usize {
        self.count(false)
    }

    fn count(&self, structured: bool) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.config.is_structured() == structured)
            .count()
    }
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn generate(&self, request: &GenerationRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = if request.config.is_structured() {
            &self.answer
        } else {
            &self.summary
        };
        match scripted {
            Ok(text) => Ok(LlmResponse {
                text: text.clone(),
                input_tokens: 10,
                output_tokens: 5,
            }),
            Err(e) => Err(LlmError::Empty(e.clone())),
        }
    }
}

pub struct FakeSearch {
    pub result: Result<Vec<String>, String>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn with_snippets(snippets: &[&str]) -> Self {
        Self {
            result: Ok(snippets.iter().map(|s| s.to_string()).collect()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            result: Err(reason.to_string()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchProvider for FakeSearch {
    async fn search(&self, query: &str) -> Result<SearchResults, RelayError> {
        self.queries.lock().unwrap().push(query.to_string());
        match &self.result {
            Ok(snippets) => Ok(SearchResults {
                snippets: snippets.clone(),
            }),
            Err(e) => Err(RelayError::SearchUnavailable(e.clone())),
        }
    }
}

#[derive(Default)]
pub struct FakeMessaging {
    pub fail_replies: bool,
    pub fail_registration: bool,
    pub replies: Mutex<Vec<(String, String)>>,
    pub registrations: Mutex<Vec<String>>,
}

impl FakeMessaging {
    pub fn replies(&self) -> Vec<(String, String)> {
        self.replies.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<String> {
        self.registrations.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessagingApi for FakeMessaging {
    async fn reply_text(&self, reply_token: &str, text: &str) -> Result<(), RelayError> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), text.to_string()));
        if self.fail_replies {
            return Err(RelayError::ReplyFailed("reply token expired".into()));
        }
        Ok(())
    }

    async fn set_webhook_endpoint(&self, endpoint: &str) -> Result<(), RelayError> {
        self.registrations.lock().unwrap().push(endpoint.to_string());
        if self.fail_registration {
            return Err(RelayError::RegistrationFailed("401 Unauthorized".into()));
        }
        Ok(())
    }
}
