mod agent;
mod config;
mod error;
mod instrumentation;
mod line;
mod llm;
mod retrieval;
mod server;
mod tunnel;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use agent::Agent;
use config::Config;
use line::LineClient;
use server::AppState;
use tunnel::{NgrokTunnel, StaticTunnel, Tunnel};

#[derive(Parser)]
#[command(
    name = "line-relay",
    about = "LINE chat relay answering from a persona, with web search fallback"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Expose the webhook through a tunnel, register it, and serve
    Serve {
        /// Local port (defaults to PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,
        /// Already-public base URL; skips starting ngrok
        #[arg(long)]
        public_url: Option<String>,
        /// Do not register the webhook endpoint with LINE
        #[arg(long)]
        no_register: bool,
    },
    /// Answer a single question locally and print the reply
    Ask {
        /// The question to answer
        question: String,
    },
    /// Register <url>/webhook as the channel's webhook endpoint
    Register {
        /// Public base URL of the relay
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = Config::from_env()?;

    match cli.command {
        Commands::Serve {
            port,
            public_url,
            no_register,
        } => serve(config, port, public_url, !no_register).await?,
        Commands::Ask { question } => {
            let agent = Agent::from_config(&config)?;
            let run_log = agent.respond(&question).await?;
            println!("\n{}\n", run_log.final_reply);
            println!("{}", run_log.summary());
        }
        Commands::Register { url } => {
            let messaging = line_client(&config)?;
            let endpoint = tunnel::register_webhook(&messaging, &url).await?;
            println!("Registered {}", endpoint);
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool, json_logs: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());
    let json = json_logs
        || std::env::var("LOG_FORMAT")
            .map(|f| f.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn line_client(config: &Config) -> Result<LineClient> {
    LineClient::new(
        &config.line_channel_access_token,
        &config.line_api_base,
        config.line_timeout,
    )
    .context("Failed to build LINE client")
}

async fn serve(
    config: Config,
    port: Option<u16>,
    public_url: Option<String>,
    register: bool,
) -> Result<()> {
    let port = port.unwrap_or(config.port);

    // Resolve every credential before binding anything
    let mut tunnel: Box<dyn Tunnel> = match public_url.or_else(|| config.public_url.clone()) {
        Some(url) => Box::new(StaticTunnel::new(&url)),
        None => Box::new(NgrokTunnel::new(
            &config.ngrok_bin,
            config.require_ngrok_authtoken()?,
            &config.ngrok_region,
            &config.ngrok_api_url,
        )?),
    };
    let agent = Agent::from_config(&config)?;
    let messaging = Arc::new(line_client(&config)?);

    let listener = tokio::net::TcpListener::bind((config.bind_addr.as_str(), port))
        .await
        .with_context(|| format!("binding to {}:{}", config.bind_addr, port))?;
    let local_port = listener
        .local_addr()
        .context("listener has no local address")?
        .port();

    tunnel::bootstrap(tunnel.as_mut(), messaging.as_ref(), local_port, register)
        .await
        .context("Failed to expose the webhook")?;

    let state = AppState {
        agent: Arc::new(agent),
        messaging,
        channel_secret: Arc::from(config.line_channel_secret.as_str()),
    };

    // `tunnel` stays alive until the server stops; dropping it ends ngrok.
    server::serve(listener, state).await?;
    drop(tunnel);
    Ok(())
}
