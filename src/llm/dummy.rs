//! Dummy completion client — echoes the last user turn prefixed with `[echo]`.
//! Used for testing the full relay pipeline without a real API key.

use std::time::Duration;

use crate::session::{Role, Turn};
use super::CompletionError;

#[derive(Debug, Clone, Default)]
pub struct DummyClient {
    latency: Option<Duration>,
}

impl DummyClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a slow upstream — each `complete` call sleeps for `latency`
    /// before replying. Used to exercise queueing and back-pressure.
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency: Some(latency) }
    }

    pub async fn complete(&self, turns: &[Turn], _user: &str) -> Result<String, CompletionError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let last_user = turns
            .iter()
            .rev()
            .find(|t| t.role == Role::User)
            .map(|t| t.content.as_str())
            .ok_or_else(|| CompletionError::InvalidRequest("no user turn in history".into()))?;
        Ok(format!("[echo] {last_user}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_last_user_turn() {
        let c = DummyClient::new();
        let turns = vec![
            Turn::new(Role::User, "first"),
            Turn::new(Role::Assistant, "[echo] first"),
            Turn::new(Role::User, "second"),
        ];
        assert_eq!(c.complete(&turns, "alice").await.unwrap(), "[echo] second");
    }

    #[tokio::test]
    async fn empty_history_is_invalid() {
        let c = DummyClient::new();
        assert!(matches!(
            c.complete(&[], "alice").await,
            Err(CompletionError::InvalidRequest(_))
        ));
    }
}
