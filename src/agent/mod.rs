pub mod composer;
pub mod summarizer;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::RelayError;
use crate::instrumentation::{ReplySource, RunLog, RunLogger};
use crate::llm::{GeminiClient, LlmProvider};
use crate::retrieval::{SearchProvider, SerperClient};

use composer::{AnswerDecision, Composer};
use summarizer::Summarizer;

/// Answer → (direct | search → summarize) pipeline for one question.
pub struct Agent {
    composer: Composer,
    summarizer: Summarizer,
    search: Arc<dyn SearchProvider>,
    no_information_reply: String,
    logger: RunLogger,
}

impl Agent {
    pub fn from_config(config: &Config) -> Result<Self> {
        let llm = GeminiClient::new(
            &config.gemini_api_key,
            &config.gemini_base_url,
            &config.gemini_model,
            config.llm_timeout,
        )
        .context("Failed to build Gemini client")?;
        let search = SerperClient::new(
            &config.serper_api_key,
            &config.serper_url,
            config.search_timeout,
        )
        .context("Failed to build search client")?;

        Self::with_providers(config, Arc::new(llm), Arc::new(search))
    }

    pub fn with_providers(
        config: &Config,
        llm: Arc<dyn LlmProvider>,
        search: Arc<dyn SearchProvider>,
    ) -> Result<Self> {
        let logger = RunLogger::new(config.run_log_dir.as_deref())?;

        Ok(Self {
            composer: Composer::new(
                llm.clone(),
                config.persona.clone(),
                config.persona_context.clone(),
            ),
            summarizer: Summarizer::new(llm, config.persona.clone()),
            search,
            no_information_reply: config.no_information_reply.clone(),
            logger,
        })
    }

    /// Runs the pipeline and returns its run log; `final_reply` is the text to
    /// send. Only failures of the first model call are returned as errors,
    /// search and summarization failures degrade to a weaker reply.
    pub async fn respond(&self, question: &str) -> Result<RunLog, RelayError> {
        let run_start = Instant::now();

        let answer_start = Instant::now();
        let (decision, answer_response) = self.composer.compose(question).await?;
        let answer_latency = answer_start.elapsed().as_millis() as u64;

        let mut input_tokens = answer_response.input_tokens;
        let mut output_tokens = answer_response.output_tokens;
        let mut search_latency = None;
        let mut summary_latency = None;
        let mut num_snippets = 0;

        let (decision_label, search_query, confidence, reply_source, final_reply) = match decision {
            AnswerDecision::Direct { response } if response.trim().is_empty() => {
                debug!("model answered directly with a blank response");
                (
                    "direct",
                    None,
                    None,
                    ReplySource::NoInformation,
                    self.no_information_reply.clone(),
                )
            }
            AnswerDecision::Direct { response } => {
                ("direct", None, None, ReplySource::Direct, response)
            }
            AnswerDecision::NeedsSearch {
                query,
                fallback,
                confidence,
            } => {
                debug!(query = %query, ?confidence, "model requested a search");

                let search_start = Instant::now();
                let searched = self.search.search(&query).await;
                search_latency = Some(search_start.elapsed().as_millis() as u64);

                let (source, reply) = match searched {
                    Err(e) => {
                        warn!(error = %e, "search failed, replying with the direct answer");
                        (ReplySource::SearchUnavailable, self.degraded(fallback))
                    }
                    Ok(results) if results.is_empty() => {
                        debug!(query = %query, "search returned no snippets");
                        (ReplySource::NoInformation, self.no_information_reply.clone())
                    }
                    Ok(results) => {
                        num_snippets =
                            results.snippets.iter().filter(|s| !s.trim().is_empty()).count() as u32;

                        let summary_start = Instant::now();
                        let summarized = self.summarizer.summarize(&results.joined()).await;
                        summary_latency = Some(summary_start.elapsed().as_millis() as u64);

                        match summarized {
                            Ok((summary, response)) => {
                                input_tokens += response.input_tokens;
                                output_tokens += response.output_tokens;
                                (ReplySource::Summary, summary)
                            }
                            Err(e) => {
                                warn!(error = %e, "summarization failed, replying with the direct answer");
                                (ReplySource::SummarizationFailed, self.degraded(fallback))
                            }
                        }
                    }
                };

                ("search", Some(query), confidence, source, reply)
            }
        };

        let run_log = RunLog {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            question: question.to_string(),
            decision: decision_label.to_string(),
            search_query,
            confidence_level: confidence,
            num_snippets,
            answer_latency_ms: answer_latency,
            search_latency_ms: search_latency,
            summary_latency_ms: summary_latency,
            total_llm_input_tokens: input_tokens,
            total_llm_output_tokens: output_tokens,
            total_latency_ms: run_start.elapsed().as_millis() as u64,
            reply_source,
            final_reply,
        };

        self.logger.record(&run_log).await;

        Ok(run_log)
    }

    /// The model's own answer, unless it left that blank.
    fn degraded(&self, fallback: String) -> String {
        if fallback.trim().is_empty() {
            self.no_information_reply.clone()
        } else {
            fallback
        }
    }
}
