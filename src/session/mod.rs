//! Session state — per-user conversation history and transient flags.
//!
//! # Architecture
//!
//! [`SessionStore`] is the pluggable key-value boundary: string keys to
//! JSON values, `get`/`set` only (no compare-and-swap is assumed).
//! [`Sessions`] wraps a store and owns the key namespacing and typed
//! (de)serialisation — the rest of the crate never sees raw keys or
//! `serde_json::Value`.
//!
//! Store failures propagate as [`AppError::Session`] (fail-closed).

pub mod history;
pub mod memory;

pub use history::{History, ResetOutcome, Role, Turn};
pub use memory::MemoryStore;

use std::sync::Arc;

use serde_json::Value;

use crate::error::AppError;

/// Key suffix under which a user's conversation history is stored.
const HISTORY_SUFFIX: &str = "_message";
/// Key suffix for the "next message sets the system prompt" flag.
const SYSTEM_FLAG_SUFFIX: &str = "_system_flag";

/// Pluggable key-value session backend.
///
/// Implementations are `Send + Sync`; methods are synchronous because the
/// in-memory backend does no I/O. A networked backend would wrap its
/// blocking client here and be driven through `spawn_blocking` by callers
/// that care.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, AppError>;
    fn set(&self, key: &str, value: Value) -> Result<(), AppError>;
}

/// Typed handle over a [`SessionStore`] — cheap to clone.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
}

impl Sessions {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    fn history_key(user: &str) -> String {
        format!("{user}{HISTORY_SUFFIX}")
    }

    fn flag_key(user: &str) -> String {
        format!("{user}{SYSTEM_FLAG_SUFFIX}")
    }

    /// Load the history for `user`; absent means an empty history.
    pub fn history(&self, user: &str) -> Result<History, AppError> {
        match self.store.get(&Self::history_key(user))? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| AppError::Session(format!("malformed history for {user}: {e}"))),
            None => Ok(History::new()),
        }
    }

    /// Write the full history back under `user`'s key.
    pub fn set_history(&self, user: &str, history: &History) -> Result<(), AppError> {
        let value = serde_json::to_value(history)
            .map_err(|e| AppError::Session(format!("serialise history: {e}")))?;
        self.store.set(&Self::history_key(user), value)
    }

    /// Mark `user`'s next message as a system-prompt definition.
    pub fn set_system_flag(&self, user: &str) -> Result<(), AppError> {
        self.store.set(&Self::flag_key(user), Value::Bool(true))
    }

    /// Consume the system flag: returns whether it was set, clearing it.
    pub fn take_system_flag(&self, user: &str) -> Result<bool, AppError> {
        let key = Self::flag_key(user);
        let set = matches!(self.store.get(&key)?, Some(Value::Bool(true)));
        if set {
            self.store.set(&key, Value::Bool(false))?;
        }
        Ok(set)
    }
}
