//! Public exposure of the local webhook listener and webhook registration.

use async_trait::async_trait;
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::line::MessagingApi;

pub const WEBHOOK_PATH: &str = "/webhook";

#[async_trait]
pub trait Tunnel: Send {
    /// Exposes `127.0.0.1:<port>` and returns the public base URL.
    async fn open(&mut self, port: u16) -> Result<String, RelayError>;
}

/// An address that is already public (reverse proxy, fixed ngrok domain).
pub struct StaticTunnel {
    url: String,
}

impl StaticTunnel {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Tunnel for StaticTunnel {
    async fn open(&mut self, _port: u16) -> Result<String, RelayError> {
        Ok(self.url.clone())
    }
}

/// Runs the ngrok agent as a child process and reads the public URL from its
/// local inspection API. The agent is killed when this value is dropped.
pub struct NgrokTunnel {
    bin: String,
    authtoken: String,
    region: String,
    api_url: String,
    client: reqwest::Client,
    attempts: u32,
    poll_interval: Duration,
    child: Option<Child>,
}

#[derive(Debug, Deserialize)]
struct TunnelList {
    #[serde(default)]
    tunnels: Vec<TunnelInfo>,
}

#[derive(Debug, Deserialize)]
struct TunnelInfo {
    public_url: String,
    #[serde(default)]
    proto: String,
}

impl NgrokTunnel {
    pub fn new(bin: &str, authtoken: &str, region: &str, api_url: &str) -> Result<Self, RelayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| RelayError::TunnelSetupFailed(e.to_string()))?;
        Ok(Self {
            bin: bin.to_string(),
            authtoken: authtoken.to_string(),
            region: region.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            client,
            attempts: 40,
            poll_interval: Duration::from_millis(250),
            child: None,
        })
    }

    fn spawn_agent(&self, port: u16) -> Result<Child, RelayError> {
        let mut child = Command::new(&self.bin)
            .arg("http")
            .arg(port.to_string())
            .args(["--authtoken", self.authtoken.as_str()])
            .args(["--region", self.region.as_str()])
            .args(["--log", "stdout", "--log-format", "json"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RelayError::TunnelSetupFailed(format!("failed to start {}: {}", self.bin, e))
            })?;

        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "ngrok", "{}", line);
                }
            });
        }

        Ok(child)
    }

    async fn wait_for_public_url(&mut self) -> Result<String, RelayError> {
        let endpoint = format!("{}/api/tunnels", self.api_url);

        for _ in 0..self.attempts {
            if let Some(child) = self.child.as_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(RelayError::TunnelSetupFailed(format!(
                        "ngrok exited early ({})",
                        status
                    )));
                }
            }

            match self.client.get(&endpoint).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<TunnelList>().await {
                        Ok(list) => {
                            if let Some(url) = pick_public_url(&list.tunnels) {
                                return Ok(url);
                            }
                        }
                        Err(e) => debug!(error = %e, "unexpected ngrok API response"),
                    }
                }
                Ok(response) => debug!(status = %response.status(), "ngrok API not ready"),
                Err(e) => debug!(error = %e, "ngrok API not reachable yet"),
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Err(RelayError::TunnelSetupFailed(format!(
            "no tunnel reported by {} after {} attempts",
            endpoint, self.attempts
        )))
    }
}

#[async_trait]
impl Tunnel for NgrokTunnel {
    async fn open(&mut self, port: u16) -> Result<String, RelayError> {
        info!(port, region = %self.region, "starting ngrok tunnel");
        self.child = Some(self.spawn_agent(port)?);
        self.wait_for_public_url().await
    }
}

/// Prefers the https tunnel when the agent reports both schemes.
fn pick_public_url(tunnels: &[TunnelInfo]) -> Option<String> {
    tunnels
        .iter()
        .find(|t| t.proto == "https" || t.public_url.starts_with("https://"))
        .or_else(|| tunnels.first())
        .map(|t| t.public_url.clone())
}

/// `https://<host>/webhook` for any public URL, whatever scheme it reports.
pub fn webhook_endpoint(public_url: &str) -> String {
    let host = public_url
        .rsplit("//")
        .next()
        .unwrap_or(public_url)
        .trim_end_matches('/');
    format!("https://{}{}", host, WEBHOOK_PATH)
}

pub async fn register_webhook(
    messaging: &dyn MessagingApi,
    public_url: &str,
) -> Result<String, RelayError> {
    let endpoint = webhook_endpoint(public_url);
    messaging.set_webhook_endpoint(&endpoint).await?;
    info!(%endpoint, "webhook endpoint registered");
    Ok(endpoint)
}

/// Opens the tunnel (fatal on failure) and registers the webhook endpoint
/// (logged on failure; the platform keeps the previous endpoint).
pub async fn bootstrap(
    tunnel: &mut dyn Tunnel,
    messaging: &dyn MessagingApi,
    port: u16,
    register: bool,
) -> Result<String, RelayError> {
    let public_url = tunnel.open(port).await?;
    info!(%public_url, port, "public tunnel ready");

    if register {
        if let Err(e) = register_webhook(messaging, &public_url).await {
            warn!(error = %e, "keeping the previously registered webhook endpoint");
        }
    }

    Ok(public_url)
}
