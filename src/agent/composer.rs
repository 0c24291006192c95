use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::RelayError;
use crate::llm::{GenerationConfig, GenerationRequest, LlmProvider, LlmResponse, Turn};

/// Outcome of the first model call.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerDecision {
    /// The model answered from the persona context; reply verbatim.
    Direct { response: String },
    /// The model asked for a web search. `fallback` is whatever direct answer
    /// it produced, used when search or summarization fails.
    NeedsSearch {
        query: String,
        fallback: String,
        confidence: Option<f64>,
    },
}

/// Shape the model is constrained to in schema mode.
pub fn answer_schema() -> Value {
    json!({
        "type": "OBJECT",
        "required": ["response", "search_required"],
        "properties": {
            "response": {
                "type": "STRING",
                "description": "Direct response to the query if known"
            },
            "search_required": {
                "type": "BOOLEAN",
                "description": "Whether additional internet search is needed"
            },
            "search_query": {
                "type": "STRING",
                "description": "Refined search query if search is required"
            },
            "confidence_level": {
                "type": "NUMBER",
                "description": "Confidence of the current response (0-1)"
            }
        }
    })
}

pub struct Composer {
    llm: Arc<dyn LlmProvider>,
    persona: String,
    context: String,
}

impl Composer {
    pub fn new(llm: Arc<dyn LlmProvider>, persona: String, context: String) -> Self {
        Self {
            llm,
            persona,
            context,
        }
    }

    pub async fn compose(&self, question: &str) -> Result<(AnswerDecision, LlmResponse), RelayError> {
        let request = GenerationRequest {
            system_instruction: Some(self.persona.clone()),
            history: vec![Turn::user(self.context.clone())],
            message: question.to_string(),
            config: GenerationConfig::structured(answer_schema()),
        };

        let response = self
            .llm
            .generate(&request)
            .await
            .map_err(|e| RelayError::ModelUnavailable(e.to_string()))?;

        let decision = parse_decision(&response.text, question)?;
        Ok((decision, response))
    }
}

fn parse_decision(text: &str, question: &str) -> Result<AnswerDecision, RelayError> {
    // Tolerate code fences or stray prose around the object
    let json_str = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };

    let raw: Value = serde_json::from_str(json_str)
        .map_err(|e| RelayError::MalformedModelOutput(format!("{}: {}", e, text)))?;
    let fields = raw
        .as_object()
        .ok_or_else(|| RelayError::MalformedModelOutput(format!("not an object: {}", text)))?;

    let response = match fields.get("response") {
        Some(Value::String(s)) => s.clone(),
        Some(other) => {
            return Err(RelayError::MalformedModelOutput(format!(
                "`response` is not a string: {}",
                other
            )))
        }
        None => {
            return Err(RelayError::MalformedModelOutput(
                "missing `response`".into(),
            ))
        }
    };

    let search_required = fields
        .get("search_required")
        .ok_or_else(|| RelayError::MalformedModelOutput("missing `search_required`".into()))?;

    // `true` or the number 1 requests a search; anything else does not.
    let wants_search = match search_required {
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    };
    if !wants_search {
        return Ok(AnswerDecision::Direct { response });
    }

    let query = fields
        .get("search_query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(question)
        .to_string();

    Ok(AnswerDecision::NeedsSearch {
        query,
        fallback: response,
        confidence: fields.get("confidence_level").and_then(Value::as_f64),
    })
}
