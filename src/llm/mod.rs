//! Completion-service client abstraction.
//!
//! [`CompletionClient`] is an enum over concrete backends — enum dispatch
//! avoids `dyn` trait objects and the `async-trait` dependency. Client
//! instances are shared immutable capabilities; clone them freely.
//!
//! [`build`] is the factory, called once at startup from config.

pub mod dummy;
pub mod openai;

use thiserror::Error;

use crate::config::LlmConfig;
use crate::error::AppError;
use crate::session::Turn;

// ── Error ─────────────────────────────────────────────────────────────────────

/// Failure taxonomy of the completion service.
///
/// Only [`CompletionError::RateLimited`] is retryable; everything else
/// propagates immediately (see [`crate::retry`]).
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("rate limited by completion service")]
    RateLimited,

    #[error("completion service rejected credentials")]
    Unauthorized,

    #[error("completion service unavailable: {0}")]
    Unavailable(String),

    #[error("invalid completion request: {0}")]
    InvalidRequest(String),
}

// ── Client enum ───────────────────────────────────────────────────────────────

/// All available completion backends.
///
/// Adding a backend = new module + new variant + new `complete` arm.
#[derive(Debug, Clone)]
pub enum CompletionClient {
    OpenAi(openai::OpenAiClient),
    Dummy(dummy::DummyClient),
}

impl CompletionClient {
    /// Send the conversation so far and return the next assistant reply.
    /// Whitespace normalisation is the caller's job, not the backend's.
    ///
    /// `user` is passed through as an abuse-tracing token where the backend
    /// supports one; it never influences the generated text.
    pub async fn complete(&self, turns: &[Turn], user: &str) -> Result<String, CompletionError> {
        match self {
            CompletionClient::OpenAi(c) => c.complete(turns, user).await,
            CompletionClient::Dummy(c) => c.complete(turns, user).await,
        }
    }
}

// ── Factory ───────────────────────────────────────────────────────────────────

/// Construct a [`CompletionClient`] from config and an optional API key.
///
/// `api_key` is sourced from `LLM_API_KEY` env (never TOML).
pub fn build(config: &LlmConfig, api_key: Option<String>) -> Result<CompletionClient, AppError> {
    match config.provider.as_str() {
        "dummy" => Ok(CompletionClient::Dummy(dummy::DummyClient::new())),
        "openai" | "openai-compatible" => {
            let oai = &config.openai;
            let c = openai::OpenAiClient::new(
                oai.api_base_url.clone(),
                oai.model.clone(),
                oai.temperature,
                oai.timeout_seconds,
                api_key,
            )
            .map_err(|e| AppError::Config(format!("cannot build openai client: {e}")))?;
            Ok(CompletionClient::OpenAi(c))
        }
        other => Err(AppError::Config(format!("unknown llm provider: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LlmConfig, OpenAiConfig};

    fn llm_config(provider: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            openai: OpenAiConfig {
                api_base_url: "http://localhost:0/v1/chat/completions".into(),
                model: "test-model".into(),
                temperature: None,
                timeout_seconds: 1,
            },
        }
    }

    #[test]
    fn build_dummy() {
        let c = build(&llm_config("dummy"), None).unwrap();
        assert!(matches!(c, CompletionClient::Dummy(_)));
    }

    #[test]
    fn build_openai() {
        let c = build(&llm_config("openai"), Some("sk-test".into())).unwrap();
        assert!(matches!(c, CompletionClient::OpenAi(_)));
    }

    #[test]
    fn build_unknown_provider_errors() {
        assert!(matches!(
            build(&llm_config("oracle"), None),
            Err(AppError::Config(_))
        ));
    }
}
