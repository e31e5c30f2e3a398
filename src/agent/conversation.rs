//! Conversation history.

use crate::types::{ConversationTurn, ModelMessage, Role};

/// Ordered record of committed user and agent turns.
///
/// Turns are only ever appended in user/agent pairs, so the history always
/// alternates and never ends on an unanswered user turn.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ConversationTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn together with the agent turn that answered it.
    pub fn commit(&mut self, user: impl Into<String>, agent: impl Into<String>) {
        self.turns.push(ModelMessage::user(user));
        self.turns.push(ModelMessage::assistant(agent));
    }

    /// All committed turns, oldest first.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Get the last N turns.
    pub fn last_n(&self, n: usize) -> &[ConversationTurn] {
        let start = self.turns.len().saturating_sub(n);
        &self.turns[start..]
    }

    /// Text of the most recent agent turn.
    pub fn last_reply(&self) -> Option<String> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == Role::Assistant)
            .map(ModelMessage::text)
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
