//! Outbound push channel — delivers asynchronously generated replies.
//!
//! Distinct from the synchronous inbound acknowledgment path: by the time a
//! reply exists, the webhook response has long been sent, so delivery goes
//! through the platform's authenticated push API instead.
//!
//! Enum dispatch, same shape as [`crate::llm::CompletionClient`].

use std::sync::{Arc, Mutex};

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, error};

use crate::config::PushConfig;
use crate::error::AppError;

// ── Channel enum ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum PushChannel {
    Http(HttpPush),
    Capture(CapturePush),
}

impl PushChannel {
    /// Deliver `text` to `recipient` out-of-band.
    pub async fn push(&self, recipient: &str, text: &str) -> Result<(), AppError> {
        match self {
            PushChannel::Http(c) => c.push(recipient, text).await,
            PushChannel::Capture(c) => c.push(recipient, text),
        }
    }
}

/// Construct a [`PushChannel`] from config and an optional credential.
///
/// `credential` is sourced from `PUSH_CREDENTIAL` env (never TOML).
pub fn build(config: &PushConfig, credential: Option<String>) -> Result<PushChannel, AppError> {
    match config.channel.as_str() {
        "capture" => Ok(PushChannel::Capture(CapturePush::new())),
        "http" => {
            if config.endpoint.is_empty() {
                return Err(AppError::Config("push.endpoint required for http push".into()));
            }
            let c = HttpPush::new(config.endpoint.clone(), config.timeout_seconds, credential)?;
            Ok(PushChannel::Http(c))
        }
        other => Err(AppError::Config(format!("unknown push channel: {other}"))),
    }
}

// ── HTTP push ─────────────────────────────────────────────────────────────────

/// Posts `{"recipient": ..., "text": ...}` to the platform push endpoint.
#[derive(Debug, Clone)]
pub struct HttpPush {
    client: Client,
    endpoint: String,
    credential: Option<String>,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    recipient: &'a str,
    text: &'a str,
}

impl HttpPush {
    pub fn new(
        endpoint: String,
        timeout_seconds: u64,
        credential: Option<String>,
    ) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| AppError::Push(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint, credential })
    }

    pub async fn push(&self, recipient: &str, text: &str) -> Result<(), AppError> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .json(&PushRequest { recipient, text });
        if let Some(cred) = &self.credential {
            req = req.bearer_auth(cred);
        }

        let response = req
            .send()
            .await
            .map_err(|e| AppError::Push(format!("push transport failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%status, %recipient, "push endpoint returned error");
            return Err(AppError::Push(format!("push endpoint HTTP {status}: {body}")));
        }

        debug!(%recipient, chars = text.chars().count(), "reply pushed");
        Ok(())
    }
}

// ── Capture push ──────────────────────────────────────────────────────────────

/// Records pushes in memory instead of delivering them.
///
/// The default channel for local runs without platform credentials, and the
/// observation point for pipeline tests.
#[derive(Debug, Clone, Default)]
pub struct CapturePush {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl CapturePush {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, recipient: &str, text: &str) -> Result<(), AppError> {
        debug!(%recipient, "capturing push");
        self.sent
            .lock()
            .map_err(|_| AppError::Push("capture channel poisoned".to_string()))?
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }

    /// Snapshot of everything pushed so far, in delivery order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn capture_records_in_order() {
        let capture = CapturePush::new();
        let channel = PushChannel::Capture(capture.clone());

        channel.push("alice", "first").await.unwrap();
        channel.push("bob", "second").await.unwrap();

        assert_eq!(
            capture.sent(),
            vec![
                ("alice".to_string(), "first".to_string()),
                ("bob".to_string(), "second".to_string()),
            ]
        );
    }

    #[test]
    fn http_channel_requires_endpoint() {
        let config = PushConfig {
            channel: "http".into(),
            endpoint: String::new(),
            timeout_seconds: 10,
        };
        assert!(matches!(build(&config, None), Err(AppError::Config(_))));
    }

    #[test]
    fn unknown_channel_errors() {
        let config = PushConfig {
            channel: "carrier-pigeon".into(),
            endpoint: String::new(),
            timeout_seconds: 10,
        };
        assert!(matches!(build(&config, None), Err(AppError::Config(_))));
    }
}
