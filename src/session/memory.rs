//! In-memory session store — process-local, lost on restart.
//!
//! The default backend. Matches the non-goal of no cross-restart
//! persistence; an external store slots in behind [`SessionStore`]
//! without touching pipeline logic.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::AppError;
use super::SessionStore;

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Value>>, AppError> {
        self.entries
            .lock()
            .map_err(|_| AppError::Session("memory store poisoned".to_string()))
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }
}
