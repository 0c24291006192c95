//! Webhook HTTP server: `POST /webhook` for LINE events, `GET /` for health checks.

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::agent::Agent;
use crate::line::{signature, MessagingApi, TextMessageEvent, WebhookBody, SIGNATURE_HEADER};

/// Immutable per-process state shared by all requests.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<Agent>,
    pub messaging: Arc<dyn MessagingApi>,
    pub channel_secret: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
}

pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<()> {
    let addr = listener.local_addr().context("listener has no local address")?;
    info!(%addr, "webhook server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("webhook server exited")?;
    info!("webhook server stopped");
    Ok(())
}

/// Completes on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received, draining connections");
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// POST /webhook: verifies `X-Line-Signature`, then answers every text
/// message event before acknowledging.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = signature::verify(&state.channel_secret, &body, provided) {
        warn!(error = %e, "rejecting webhook, check the channel secret");
        return (StatusCode::BAD_REQUEST, "Invalid signature");
    }

    debug!(body = %String::from_utf8_lossy(&body), "webhook body");

    let parsed = match WebhookBody::parse(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(error = %e, "signed webhook body could not be parsed");
            return (StatusCode::OK, "OK");
        }
    };

    let messages = parsed.text_messages();
    debug!(
        destination = parsed.destination.as_deref().unwrap_or("-"),
        events = parsed.events.len(),
        text_messages = messages.len(),
        "webhook events received"
    );

    for event in &messages {
        let span = info_span!(
            "message",
            event_id = event.event_id.as_deref().unwrap_or("-"),
            message_id = event.message_id.as_deref().unwrap_or("-"),
            redelivery = event.is_redelivery
        );
        handle_text_message(&state, event).instrument(span).await;
    }

    (StatusCode::OK, "OK")
}

async fn handle_text_message(state: &AppState, event: &TextMessageEvent) {
    let run = match state.agent.respond(&event.text).await {
        Ok(run) => run,
        Err(e) => {
            error!(error = %e, "pipeline failed, no reply sent");
            return;
        }
    };

    if let Err(e) = state
        .messaging
        .reply_text(&event.reply_token, &run.final_reply)
        .await
    {
        error!(error = %e, run_id = %run.id, "failed to deliver reply");
    }
}
