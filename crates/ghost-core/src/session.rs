//! Session State
//!
//! In-memory state of one chat session. Discarded when the human ends the
//! session; nothing here is persisted.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::message::{Turn, TurnRole};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered turns plus the backend continuation token, if any
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    pub id: SessionId,

    /// Active model identifier
    pub model: String,

    turns: Vec<Turn>,

    /// Backend-assigned token for backends that keep history server-side
    continuation: Option<String>,
}

impl ConversationState {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            model: model.into(),
            turns: Vec::new(),
            continuation: None,
        }
    }

    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn continuation(&self) -> Option<&str> {
        self.continuation.as_deref()
    }

    pub fn set_continuation(&mut self, token: impl Into<String>) {
        self.continuation = Some(token.into());
    }

    /// Number of tool results fed back so far
    pub fn tool_calls_made(&self) -> usize {
        self.turns
            .iter()
            .filter(|t| t.role == TurnRole::ToolResult)
            .count()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
