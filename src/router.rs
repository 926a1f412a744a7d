//! Command router — decides what an inbound message means.
//!
//! Exactly one of four outcomes per message:
//! setup command, reset command, pending system-prompt definition, or
//! ordinary conversational text handed to the reply dispatcher.
//!
//! Matching is exact-string after trimming — `"/reset please"` is
//! conversation, not a command. Control commands are handled synchronously
//! (session mutation only, no completion call); conversational text returns
//! an empty acknowledgment immediately while the reply is generated in the
//! background.

use tracing::{debug, info};

use crate::config::CommandsConfig;
use crate::dispatch::ReplyDispatcher;
use crate::error::AppError;
use crate::session::{ResetOutcome, Sessions};

// ── User-facing reply strings ─────────────────────────────────────────────────

/// Returned when a new user subscribes.
pub const GREETING: &str = "欢迎订阅~\n请向我回复文字以开始对话~\n回复 /system 以设置系统消息~\n回复 /reset 以重置会话，避免会话过长等待时间较久~";

/// Returned by the setup command, prompting for the system message.
pub const SETUP_PROMPT: &str = "请向我回复文字以设置系统消息~";

/// Returned when a reset kept the leading system turn.
pub const RESET_KEPT_SYSTEM: &str = "已重置system外的会话~\n再次请求 /reset 以重置所有会话~";

/// Returned when a reset cleared the whole session.
pub const RESET_CLEARED: &str = "会话已重置，请向我回复文字以开始对话~\n回复 /system 以设置系统消息~\n回复 /reset 以重置会话，避免会话过长等待时间较久~";

/// Confirmation for a newly stored system message.
pub fn system_set_confirmation(content: &str) -> String {
    format!("已设置为 {content}\n请向我回复文字以开始对话~")
}

// ── Router ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CommandRouter {
    commands: CommandsConfig,
    sessions: Sessions,
    dispatcher: ReplyDispatcher,
}

impl CommandRouter {
    pub fn new(commands: CommandsConfig, sessions: Sessions, dispatcher: ReplyDispatcher) -> Self {
        Self { commands, sessions, dispatcher }
    }

    /// Handle one inbound message and return the synchronous acknowledgment
    /// body (empty for dispatched conversational text).
    pub fn handle(&self, user: &str, content: &str) -> Result<String, AppError> {
        let text = content.trim();

        if text == self.commands.setup {
            return self.enter_setup_mode(user);
        }
        if text == self.commands.reset {
            return self.reset(user);
        }
        if self.sessions.take_system_flag(user)? {
            return self.store_system_message(user, text);
        }

        self.dispatcher.dispatch(user, content.to_string())?;
        Ok(String::new())
    }

    /// Greeting for a subscribe event — session state is untouched.
    pub fn greet(&self) -> &'static str {
        GREETING
    }

    fn enter_setup_mode(&self, user: &str) -> Result<String, AppError> {
        info!(%user, "entering system-message setup mode");
        // The prior conversation is discarded; the next message becomes the
        // sole system turn.
        self.sessions.set_history(user, &Default::default())?;
        self.sessions.set_system_flag(user)?;
        Ok(SETUP_PROMPT.to_string())
    }

    fn reset(&self, user: &str) -> Result<String, AppError> {
        let mut history = self.sessions.history(user)?;
        let outcome = history.reset();
        self.sessions.set_history(user, &history)?;
        info!(%user, ?outcome, "session reset");
        Ok(match outcome {
            ResetOutcome::KeptSystem => RESET_KEPT_SYSTEM.to_string(),
            ResetOutcome::Cleared => RESET_CLEARED.to_string(),
        })
    }

    fn store_system_message(&self, user: &str, text: &str) -> Result<String, AppError> {
        let mut history = self.sessions.history(user)?;
        history.set_system(text);
        self.sessions.set_history(user, &history)?;
        debug!(%user, "system message stored");
        Ok(system_set_confirmation(text))
    }
}
