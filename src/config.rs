//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` relative to the current working directory,
//! then applies `RELAY_BIND` and `RELAY_LOG_LEVEL` env overrides.
//! Secrets (`LLM_API_KEY`, `PUSH_CREDENTIAL`) come from env only — never TOML.

use std::{env, fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::AppError;
use crate::retry::{DEFAULT_BACKOFF, DEFAULT_MAX_ATTEMPTS, RetryPolicy};

/// Control commands recognised in inbound text (exact match after trim).
#[derive(Debug, Clone)]
pub struct CommandsConfig {
    /// Enters system-message-setting mode.
    pub setup: String,
    /// Two-stage session reset.
    pub reset: String,
}

/// OpenAI / OpenAI-compatible client configuration (`[llm.openai]`).
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model name passed in the request body.
    pub model: String,
    /// Sampling temperature; omitted from the request when `None`.
    pub temperature: Option<f32>,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Completion-service configuration (`[llm]`).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Which backend is active (`"dummy"`, `"openai"`).
    /// Maps to `default` in `[llm]` TOML so other backend sections can
    /// coexist without being loaded.
    pub provider: String,
    pub openai: OpenAiConfig,
}

/// Push-channel configuration (`[push]`).
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Which channel is active (`"capture"`, `"http"`).
    pub channel: String,
    /// Endpoint for the HTTP push channel.
    pub endpoint: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
}

/// Reply-dispatcher configuration (`[dispatch]`).
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Worker count; `None` means `2 × available parallelism + 1`.
    pub workers: Option<usize>,
    /// Per-worker queue depth; a full queue fails the dispatch visibly.
    pub queue_depth: usize,
    /// Completion attempt budget per message.
    pub max_attempts: u32,
    /// Fixed back-off between rate-limited attempts, in milliseconds.
    pub backoff_ms: u64,
}

impl DispatchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }
}

/// Fully-resolved relay configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Socket address the inbound webhook adapter binds to.
    pub bind: String,
    pub log_level: String,
    pub commands: CommandsConfig,
    pub llm: LlmConfig,
    /// API key from `LLM_API_KEY` env — `None` for keyless local backends.
    pub llm_api_key: Option<String>,
    pub push: PushConfig,
    /// Push credential from `PUSH_CREDENTIAL` env.
    pub push_credential: Option<String>,
    pub dispatch: DispatchConfig,
}

// ── Raw TOML shape ────────────────────────────────────────────────────────────

#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    commands: RawCommands,
    #[serde(default)]
    llm: RawLlm,
    #[serde(default)]
    push: RawPush,
    #[serde(default)]
    dispatch: RawDispatch,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self { bind: default_bind(), log_level: default_log_level() }
    }
}

#[derive(Deserialize)]
struct RawCommands {
    #[serde(default = "default_setup_command")]
    setup: String,
    #[serde(default = "default_reset_command")]
    reset: String,
}

impl Default for RawCommands {
    fn default() -> Self {
        Self { setup: default_setup_command(), reset: default_reset_command() }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    /// Maps to `default = "..."` in `[llm]`.
    #[serde(rename = "default", default = "default_llm_provider")]
    provider: String,
    #[serde(default)]
    openai: RawOpenAi,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self { provider: default_llm_provider(), openai: RawOpenAi::default() }
    }
}

#[derive(Deserialize)]
struct RawOpenAi {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    model: String,
    #[serde(default)]
    temperature: Option<f32>,
    #[serde(default = "default_openai_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawOpenAi {
    fn default() -> Self {
        Self {
            api_base_url: default_openai_api_base_url(),
            model: default_openai_model(),
            temperature: None,
            timeout_seconds: default_openai_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawPush {
    /// Maps to `default = "..."` in `[push]`.
    #[serde(rename = "default", default = "default_push_channel")]
    channel: String,
    #[serde(default)]
    endpoint: String,
    #[serde(default = "default_push_timeout_seconds")]
    timeout_seconds: u64,
}

impl Default for RawPush {
    fn default() -> Self {
        Self {
            channel: default_push_channel(),
            endpoint: String::new(),
            timeout_seconds: default_push_timeout_seconds(),
        }
    }
}

#[derive(Deserialize)]
struct RawDispatch {
    #[serde(default)]
    workers: Option<usize>,
    #[serde(default = "default_queue_depth")]
    queue_depth: usize,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
    #[serde(default = "default_backoff_ms")]
    backoff_ms: u64,
}

impl Default for RawDispatch {
    fn default() -> Self {
        Self {
            workers: None,
            queue_depth: default_queue_depth(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_bind() -> String { "127.0.0.1:8080".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_setup_command() -> String { "/system".to_string() }
fn default_reset_command() -> String { "/reset".to_string() }
fn default_llm_provider() -> String { "dummy".to_string() }
fn default_openai_api_base_url() -> String { "https://api.openai.com/v1/chat/completions".to_string() }
fn default_openai_model() -> String { "gpt-3.5-turbo".to_string() }
fn default_openai_timeout_seconds() -> u64 { 60 }
fn default_push_channel() -> String { "capture".to_string() }
fn default_push_timeout_seconds() -> u64 { 10 }
fn default_queue_depth() -> usize { 64 }
fn default_max_attempts() -> u32 { DEFAULT_MAX_ATTEMPTS }
fn default_backoff_ms() -> u64 { DEFAULT_BACKOFF.as_millis() as u64 }

/// Load config from `config/default.toml`, then apply env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let bind_override = env::var("RELAY_BIND").ok();
    let log_level_override = env::var("RELAY_LOG_LEVEL").ok();
    load_from(
        Path::new("config/default.toml"),
        bind_override.as_deref(),
        log_level_override.as_deref(),
    )
}

/// Internal loader — accepts an explicit path and optional overrides.
/// Tests pass overrides directly instead of mutating env vars.
pub fn load_from(
    path: &Path,
    bind_override: Option<&str>,
    log_level_override: Option<&str>,
) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    if parsed.dispatch.max_attempts == 0 {
        return Err(AppError::Config("dispatch.max_attempts must be at least 1".into()));
    }
    if parsed.dispatch.queue_depth == 0 {
        return Err(AppError::Config("dispatch.queue_depth must be at least 1".into()));
    }

    Ok(Config {
        bind: bind_override.unwrap_or(&parsed.server.bind).to_string(),
        log_level: log_level_override.unwrap_or(&parsed.server.log_level).to_string(),
        commands: CommandsConfig {
            setup: parsed.commands.setup,
            reset: parsed.commands.reset,
        },
        llm: LlmConfig {
            provider: parsed.llm.provider,
            openai: OpenAiConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                model: parsed.llm.openai.model,
                temperature: parsed.llm.openai.temperature,
                timeout_seconds: parsed.llm.openai.timeout_seconds,
            },
        },
        llm_api_key: env::var("LLM_API_KEY").ok(),
        push: PushConfig {
            channel: parsed.push.channel,
            endpoint: parsed.push.endpoint,
            timeout_seconds: parsed.push.timeout_seconds,
        },
        push_credential: env::var("PUSH_CREDENTIAL").ok(),
        dispatch: DispatchConfig {
            workers: parsed.dispatch.workers,
            queue_depth: parsed.dispatch.queue_depth,
            max_attempts: parsed.dispatch.max_attempts,
            backoff_ms: parsed.dispatch.backoff_ms,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL_TOML: &str = r#"
[server]
bind = "127.0.0.1:9000"
"#;

    fn write_toml(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:9000");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.commands.setup, "/system");
        assert_eq!(cfg.commands.reset, "/reset");
        assert_eq!(cfg.llm.provider, "dummy");
        assert_eq!(cfg.llm.openai.model, "gpt-3.5-turbo");
        assert_eq!(cfg.push.channel, "capture");
        assert_eq!(cfg.dispatch.max_attempts, 3);
        assert_eq!(cfg.dispatch.backoff_ms, 1000);
        assert_eq!(cfg.dispatch.workers, None);
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let f = write_toml("");
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.bind, "127.0.0.1:8080");
        assert_eq!(cfg.dispatch.queue_depth, 64);
    }

    #[test]
    fn full_sections_parse() {
        let f = write_toml(
            r#"
[llm]
default = "openai"

[llm.openai]
model = "gpt-4o-mini"
temperature = 0.2
timeout_seconds = 30

[push]
default = "http"
endpoint = "https://push.example/send"

[dispatch]
workers = 4
queue_depth = 16
max_attempts = 5
backoff_ms = 250
"#,
        );
        let cfg = load_from(f.path(), None, None).unwrap();
        assert_eq!(cfg.llm.provider, "openai");
        assert_eq!(cfg.llm.openai.model, "gpt-4o-mini");
        assert_eq!(cfg.llm.openai.temperature, Some(0.2));
        assert_eq!(cfg.push.channel, "http");
        assert_eq!(cfg.push.endpoint, "https://push.example/send");
        assert_eq!(cfg.dispatch.workers, Some(4));
        assert_eq!(cfg.dispatch.retry_policy().max_attempts, 5);
        assert_eq!(cfg.dispatch.retry_policy().backoff, Duration::from_millis(250));
    }

    #[test]
    fn overrides_win() {
        let f = write_toml(MINIMAL_TOML);
        let cfg = load_from(f.path(), Some("0.0.0.0:7000"), Some("debug")).unwrap();
        assert_eq!(cfg.bind, "0.0.0.0:7000");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn missing_file_errors() {
        let result = load_from(Path::new("/nonexistent/config.toml"), None, None);
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn zero_attempts_rejected() {
        let f = write_toml("[dispatch]\nmax_attempts = 0\n");
        assert!(matches!(load_from(f.path(), None, None), Err(AppError::Config(_))));
    }
}
