//! OpenAI-compatible chat completion client (`/v1/chat/completions`).
//!
//! All wire types are private to this module — callers only see
//! [`crate::session::Turn`] in and `String` out. History management lives
//! in the dispatch pipeline; this client is one round-trip only.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::session::Turn;
use super::CompletionError;

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Covers OpenAI and compatible local servers. Constructed once at startup,
/// then cheaply cloned because `reqwest::Client` is an `Arc` internally.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: Client,
    api_base_url: String,
    model: String,
    temperature: Option<f32>,
    api_key: Option<String>,
}

impl OpenAiClient {
    /// Build a client from config values and an optional API key.
    ///
    /// When present, `api_key` is sent as `Authorization: Bearer <key>` on
    /// every request; keyless local endpoints pass `None`.
    pub fn new(
        api_base_url: String,
        model: String,
        temperature: Option<f32>,
        timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| CompletionError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, api_base_url, model, temperature, api_key })
    }

    /// Send the conversation and return the assistant reply, trimmed.
    ///
    /// `user` is forwarded in the request's `user` field as an abuse-tracing
    /// token, as the upstream API intends.
    pub async fn complete(&self, turns: &[Turn], user: &str) -> Result<String, CompletionError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: turns,
            temperature: self.temperature,
            user,
        };

        debug!(model = %self.model, turns = turns.len(), "sending completion request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full completion request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await.map_err(|e| {
            error!(url = %self.api_base_url, error = %e, "completion HTTP request failed (transport)");
            CompletionError::Unavailable(e.to_string())
        })?;

        let response = check_status(response).await?;

        let parsed = response.json::<ChatCompletionResponse>().await.map_err(|e| {
            error!(error = %e, "failed to deserialize completion response");
            CompletionError::Unavailable(format!("failed to parse response body: {e}"))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CompletionError::Unavailable("empty or missing content in response".into()))
    }
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    user: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Consume the response and return it if successful, or a taxonomy error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CompletionError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_string());

    let message = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(env) => format!("HTTP {status}: {}", env.error.message),
        Err(_) => format!("HTTP {status}: {body}"),
    };

    error!(%status, %message, "completion request returned HTTP error");
    Err(classify_status(status, message))
}

/// Map an HTTP error status onto the [`CompletionError`] taxonomy.
fn classify_status(status: StatusCode, message: String) -> CompletionError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => CompletionError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CompletionError::Unauthorized,
        s if s.is_client_error() => CompletionError::InvalidRequest(message),
        _ => CompletionError::Unavailable(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::History;

    #[test]
    fn status_classification() {
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, String::new()),
            CompletionError::RateLimited
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, String::new()),
            CompletionError::Unauthorized
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, String::new()),
            CompletionError::Unauthorized
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, String::new()),
            CompletionError::InvalidRequest(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, String::new()),
            CompletionError::Unavailable(_)
        ));
    }

    #[test]
    fn request_serialises_history_as_messages() {
        let mut h = History::new();
        h.set_system("be terse");
        h.push_user("hi");

        let payload = ChatCompletionRequest {
            model: "test-model",
            messages: h.turns(),
            temperature: None,
            user: "alice",
        };
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["model"], "test-model");
        assert_eq!(json["user"], "alice");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert!(json.get("temperature").is_none());
    }
}
