//! Conversation transcript kept by the dispatcher and replayed to the
//! reasoning service on every request.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// An action the reasoning service asked for, with the id it expects to see
/// acknowledged in a tool turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCall {
    pub call_id: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    /// Actions requested by an assistant turn.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionCall>,
    /// The call a tool turn acknowledges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content.into())
    }

    pub fn assistant(content: impl Into<String>, actions: Vec<ActionCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            actions,
            call_id: None,
        }
    }

    /// The acknowledgement the protocol requires for every requested action.
    pub fn tool_result(call: &ActionCall) -> Self {
        Self {
            role: Role::Tool,
            content: format!("{} executed successfully.", call.action),
            actions: Vec::new(),
            call_id: Some(call.call_id.clone()),
        }
    }

    fn plain(role: Role, content: String) -> Self {
        Self {
            role,
            content,
            actions: Vec::new(),
            call_id: None,
        }
    }
}

/// Ordered, append-only list of turns, starting with the system prompt.
///
/// With a window configured, the oldest complete exchanges (a user turn and
/// every turn up to the next user turn) are evicted once more than `window`
/// exchanges are held. The system turn is never evicted, and tool turns are
/// never separated from the assistant turn that requested them.
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
    window: Option<usize>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            turns: vec![ConversationTurn::system(system_prompt)],
            window: None,
        }
    }

    /// Keep at most `exchanges` user exchanges. Zero disables eviction.
    pub fn with_window(mut self, exchanges: usize) -> Self {
        self.window = (exchanges > 0).then_some(exchanges);
        self.evict();
        self
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        let starts_exchange = turn.role == Role::User;
        self.turns.push(turn);
        if starts_exchange {
            self.evict();
        }
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    fn evict(&mut self) {
        let Some(window) = self.window else {
            return;
        };
        let user_turns: Vec<usize> = self
            .turns
            .iter()
            .enumerate()
            .filter(|(_, turn)| turn.role == Role::User)
            .map(|(idx, _)| idx)
            .collect();
        if user_turns.len() <= window {
            return;
        }
        let first_kept = user_turns[user_turns.len() - window];
        let head = usize::from(self.turns.first().is_some_and(|t| t.role == Role::System));
        self.turns.drain(head..first_kept);
    }
}
