use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Where the final reply text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Direct,
    Summary,
    NoInformation,
    SearchUnavailable,
    SummarizationFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunLog {
    pub id: String,
    pub timestamp: String,
    pub question: String,
    pub decision: String,
    pub search_query: Option<String>,
    pub confidence_level: Option<f64>,
    pub num_snippets: u32,
    pub answer_latency_ms: u64,
    pub search_latency_ms: Option<u64>,
    pub summary_latency_ms: Option<u64>,
    pub total_llm_input_tokens: u32,
    pub total_llm_output_tokens: u32,
    pub total_latency_ms: u64,
    pub reply_source: ReplySource,
    pub final_reply: String,
}

impl RunLog {
    pub fn total_tokens(&self) -> u32 {
        self.total_llm_input_tokens + self.total_llm_output_tokens
    }

    pub fn summary(&self) -> String {
        format!(
            "Decision: {} | Reply: {:?} | Snippets: {} | Total latency: {:.1}s | Tokens used by LLM: {}",
            self.decision,
            self.reply_source,
            self.num_snippets,
            self.total_latency_ms as f64 / 1000.0,
            self.total_tokens(),
        )
    }
}

/// Records every run as a structured tracing event, and appends it to
/// `runs.jsonl` when a directory is configured.
pub struct RunLogger {
    dir: Option<PathBuf>,
}

impl RunLogger {
    pub fn new(dir: Option<&str>) -> Result<Self> {
        let dir = dir.map(PathBuf::from);
        if let Some(dir) = &dir {
            fs::create_dir_all(dir).context("Failed to create logs directory")?;
        }
        Ok(Self { dir })
    }

    pub async fn record(&self, run_log: &RunLog) {
        info!(
            run_id = %run_log.id,
            decision = %run_log.decision,
            reply_source = ?run_log.reply_source,
            snippets = run_log.num_snippets,
            latency_ms = run_log.total_latency_ms,
            tokens = run_log.total_tokens(),
            "pipeline finished"
        );

        if let Err(e) = self.write(run_log).await {
            warn!(error = %e, "failed to append run log");
        }
    }

    async fn write(&self, run_log: &RunLog) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let path = dir.join("runs.jsonl");
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .context("Failed to open log file")?;

        // One write per line so concurrent requests do not interleave
        let mut json = serde_json::to_string(run_log).context("Failed to serialize run log")?;
        json.push('\n');
        file.write_all(json.as_bytes())
            .await
            .context("Failed to write log")?;
        file.flush().await.context("Failed to flush log")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_log(id: &str) -> RunLog {
        RunLog {
            id: id.into(),
            timestamp: "2026-10-19T00:00:00Z".into(),
            question: "What is your job title?".into(),
            decision: "direct".into(),
            search_query: None,
            confidence_level: None,
            num_snippets: 0,
            answer_latency_ms: 120,
            search_latency_ms: None,
            summary_latency_ms: None,
            total_llm_input_tokens: 30,
            total_llm_output_tokens: 12,
            total_latency_ms: 1500,
            reply_source: ReplySource::Direct,
            final_reply: "Data Scientist".into(),
        }
    }

    #[test]
    fn summary_reports_decision_and_tokens() {
        let summary = run_log("a").summary();
        assert!(summary.contains("Decision: direct"));
        assert!(summary.contains("Reply: Direct"));
        assert!(summary.contains("1.5s"));
        assert!(summary.contains("Tokens used by LLM: 42"));
    }

    #[tokio::test]
    async fn appends_one_json_line_per_run() {
        let dir = std::env::temp_dir().join(format!("line-relay-runs-{}", uuid::Uuid::new_v4()));
        let logger = RunLogger::new(dir.to_str()).unwrap();

        logger.record(&run_log("first")).await;
        logger.record(&run_log("second")).await;

        let contents = fs::read_to_string(dir.join("runs.jsonl")).unwrap();
        let lines: Vec<RunLog> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].id, "second");
        assert_eq!(lines[0].reply_source, ReplySource::Direct);
        assert!(contents.contains(r#""reply_source":"direct""#));

        let _ = fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn without_dir_nothing_is_written() {
        let logger = RunLogger::new(None).unwrap();
        assert!(logger.write(&run_log("x")).await.is_ok());
    }
}
