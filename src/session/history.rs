//! Conversation history — the ordered turn sequence sent to the completion
//! service for one user.
//!
//! Invariants maintained by the operations below:
//! - at most one system turn, always at index 0;
//! - turns are chronological and immutable once appended.
//!
//! The serialised form is the plain turn array (`#[serde(transparent)]`),
//! which doubles as the chat-completions `messages` wire format.

use serde::{Deserialize, Serialize};

/// Author of a [`Turn`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message unit exchanged with the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// Outcome of [`History::reset`] — selects the user-facing confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    /// Conversation turns dropped, leading system turn retained.
    KeptSystem,
    /// Everything dropped, including any system turn.
    Cleared,
}

/// Ordered conversation history for a single user key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The leading system turn, if one is set.
    pub fn system(&self) -> Option<&Turn> {
        self.turns.first().filter(|t| t.role == Role::System)
    }

    /// Append a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, content));
    }

    /// Append an assistant turn.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(Turn::new(Role::Assistant, content));
    }

    /// Replace the whole history with a single system turn.
    pub fn set_system(&mut self, content: impl Into<String>) {
        self.turns = vec![Turn::new(Role::System, content)];
    }

    /// Two-stage reset.
    ///
    /// If a leading system turn exists and other turns follow, only the
    /// conversation turns are dropped; a consecutive reset then clears the
    /// retained system turn as well. Without a system turn a single reset
    /// clears everything.
    pub fn reset(&mut self) -> ResetOutcome {
        if self.turns.len() > 1 && self.turns[0].role == Role::System {
            self.turns.truncate(1);
            ResetOutcome::KeptSystem
        } else {
            self.turns.clear();
            ResetOutcome::Cleared
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populated() -> History {
        let mut h = History::new();
        h.set_system("be terse");
        h.push_user("hi");
        h.push_assistant("hello");
        h
    }

    #[test]
    fn appends_keep_order() {
        let h = populated();
        let roles: Vec<Role> = h.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn set_system_replaces_everything() {
        let mut h = populated();
        h.set_system("new directive");
        assert_eq!(h.len(), 1);
        assert_eq!(h.system().unwrap().content, "new directive");
    }

    #[test]
    fn reset_keeps_system_then_clears_it() {
        let mut h = populated();

        assert_eq!(h.reset(), ResetOutcome::KeptSystem);
        assert_eq!(h.len(), 1);
        assert_eq!(h.system().unwrap().content, "be terse");

        assert_eq!(h.reset(), ResetOutcome::Cleared);
        assert!(h.is_empty());
    }

    #[test]
    fn reset_without_system_clears_in_one_step() {
        let mut h = History::new();
        h.push_user("hi");
        h.push_assistant("hello");

        assert_eq!(h.reset(), ResetOutcome::Cleared);
        assert!(h.is_empty());
    }

    #[test]
    fn reset_on_empty_history_is_cleared() {
        let mut h = History::new();
        assert_eq!(h.reset(), ResetOutcome::Cleared);
        assert!(h.is_empty());
    }

    #[test]
    fn serialises_as_wire_messages() {
        let h = populated();
        let json = serde_json::to_string(&h).unwrap();
        assert!(json.starts_with('['));
        assert!(json.contains(r#""role":"system""#));
        assert!(json.contains(r#""role":"assistant""#));

        let back: History = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
