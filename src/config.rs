use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_PERSONA: &str = "You are a chat assistant that answers questions about the profile you were given. \
If you cannot answer from the details you have, say that it is outside of your knowledge. \
Some questions may be answered informally, but always stay polite.";

pub const DEFAULT_PERSONA_CONTEXT: &str = "You have no profile details beyond general knowledge. \
Answer formally, concisely and politely. If a question cannot be answered from what you know \
but could be answered by searching the internet, ask for a search. If it is unrelated and \
cannot be answered, reply that it is outside of the information you have.";

pub const DEFAULT_NO_INFORMATION_REPLY: &str =
    "Sorry, that is outside of the information I have.";

#[derive(Debug, Clone)]
pub struct Config {
    pub line_channel_secret: String,
    pub line_channel_access_token: String,
    pub line_api_base: String,
    pub gemini_api_key: String,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub serper_api_key: String,
    pub serper_url: String,
    pub ngrok_authtoken: Option<String>,
    pub ngrok_region: String,
    pub ngrok_bin: String,
    pub ngrok_api_url: String,
    pub public_url: Option<String>,
    pub bind_addr: String,
    pub port: u16,
    pub persona: String,
    pub persona_context: String,
    pub no_information_reply: String,
    pub llm_timeout: Duration,
    pub search_timeout: Duration,
    pub line_timeout: Duration,
    pub run_log_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source; `from_env` passes
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());
        let required = |name: &str| lookup(name).context(format!("{} must be set", name));
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let secs = |name: &str, default: u64| secs_var(name, lookup(name), default);

        let persona_context = match optional("PERSONA_CONTEXT_FILE") {
            Some(path) => std::fs::read_to_string(&path)
                .context(format!("Failed to read PERSONA_CONTEXT_FILE: {}", path))?,
            None => optional("PERSONA_CONTEXT").unwrap_or_else(|| DEFAULT_PERSONA_CONTEXT.into()),
        };

        Ok(Self {
            line_channel_secret: required("LINE_CHANNEL_SECRET")?,
            line_channel_access_token: required("LINE_CHANNEL_ACCESS_TOKEN")?,
            line_api_base: var("LINE_API_BASE", "https://api.line.me"),
            gemini_api_key: required("GEMINI_TOKEN")?,
            gemini_base_url: var(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com",
            ),
            gemini_model: var("GEMINI_MODEL", "gemini-1.5-flash"),
            serper_api_key: required("SERPER_TOKEN")?,
            serper_url: var("SERPER_URL", "https://google.serper.dev/search"),
            ngrok_authtoken: optional("NGROK_AUTHTOKEN"),
            ngrok_region: var("NGROK_REGION", "ap"),
            ngrok_bin: var("NGROK_BIN", "ngrok"),
            ngrok_api_url: var("NGROK_API_URL", "http://127.0.0.1:4040"),
            public_url: optional("PUBLIC_URL"),
            bind_addr: var("BIND_ADDR", "0.0.0.0"),
            port: var("PORT", "5000")
                .parse()
                .context("PORT must be a port number")?,
            persona: optional("BOT_PERSONA").unwrap_or_else(|| DEFAULT_PERSONA.into()),
            persona_context,
            no_information_reply: optional("NO_INFORMATION_REPLY")
                .unwrap_or_else(|| DEFAULT_NO_INFORMATION_REPLY.into()),
            llm_timeout: secs("LLM_TIMEOUT_SECS", 60)?,
            search_timeout: secs("SEARCH_TIMEOUT_SECS", 10)?,
            line_timeout: secs("LINE_TIMEOUT_SECS", 10)?,
            run_log_dir: optional("RUN_LOG_DIR"),
        })
    }

    /// Checked before serving so a missing tunnel token fails at startup
    /// instead of after the listener is up.
    pub fn require_ngrok_authtoken(&self) -> Result<&str> {
        self.ngrok_authtoken
            .as_deref()
            .context("NGROK_AUTHTOKEN must be set unless PUBLIC_URL is given")
    }
}

fn secs_var(name: &str, value: Option<String>, default: u64) -> Result<Duration> {
    let secs: u64 = match value {
        Some(v) => v
            .trim()
            .parse()
            .context(format!("{} must be a number of seconds", name))?,
        None => default,
    };
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
impl Config {
    /// Config pointing every provider at `base` (a loopback fixture server).
    pub fn for_tests(base: &str) -> Self {
        Self {
            line_channel_secret: "channel-secret".into(),
            line_channel_access_token: "channel-token".into(),
            line_api_base: base.into(),
            gemini_api_key: "gemini-key".into(),
            gemini_base_url: base.into(),
            gemini_model: "gemini-1.5-flash".into(),
            serper_api_key: "serper-key".into(),
            serper_url: format!("{}/search", base),
            ngrok_authtoken: None,
            ngrok_region: "ap".into(),
            ngrok_bin: "ngrok".into(),
            ngrok_api_url: base.into(),
            public_url: None,
            bind_addr: "127.0.0.1".into(),
            port: 0,
            persona: DEFAULT_PERSONA.into(),
            persona_context: DEFAULT_PERSONA_CONTEXT.into(),
            no_information_reply: DEFAULT_NO_INFORMATION_REPLY.into(),
            llm_timeout: Duration::from_secs(5),
            search_timeout: Duration::from_millis(300),
            line_timeout: Duration::from_secs(5),
            run_log_dir: None,
        }
    }
}
