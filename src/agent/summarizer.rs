use std::sync::Arc;

use crate::error::RelayError;
use crate::llm::{GenerationConfig, GenerationRequest, LlmProvider, LlmResponse, Turn};

const SUMMARY_INSTRUCTION: &str = "Summarize the following search results so they are easy to understand and engaging, \
keeping the useful details. Reply in the language of the results. Search results:";

const SUMMARY_REQUEST: &str = "Summarize the information.";

pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
    persona: String,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, persona: String) -> Self {
        Self { llm, persona }
    }

    /// `snippets` is the delimited snippet string of one search.
    pub async fn summarize(&self, snippets: &str) -> Result<(String, LlmResponse), RelayError> {
        let request = GenerationRequest {
            system_instruction: Some(self.persona.clone()),
            history: vec![Turn::user(format!("{} {}", SUMMARY_INSTRUCTION, snippets))],
            message: SUMMARY_REQUEST.to_string(),
            config: GenerationConfig::free_text(),
        };

        let response = self
            .llm
            .generate(&request)
            .await
            .map_err(|e| RelayError::SummarizationFailed(e.to_string()))?;

        if response.text.trim().is_empty() {
            return Err(RelayError::SummarizationFailed(
                "model returned an empty summary".into(),
            ));
        }

        Ok((response.text.clone(), response))
    }
}
