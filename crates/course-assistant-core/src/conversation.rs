//! Conversation state and history formatting.
//!
//! The conversation is an append-only list of [`Turn`]s. The generation
//! service speaks a different role vocabulary (`user` / `model`), so
//! [`ConversationState::to_external_format`] converts on the way out and
//! [`ConversationState::from_external_format`] converts back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::usage::TokenUsage;

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// External role for assistant turns.
pub const EXTERNAL_MODEL_ROLE: &str = "model";
/// External role for user turns.
pub const EXTERNAL_USER_ROLE: &str = "user";

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Role name in the generation service's vocabulary.
    pub fn to_external(self) -> &'static str {
        match self {
            Role::User => EXTERNAL_USER_ROLE,
            Role::Assistant => EXTERNAL_MODEL_ROLE,
        }
    }

    /// Inverse of [`to_external`](Self::to_external).
    pub fn from_external(role: &str) -> Result<Self> {
        match role {
            EXTERNAL_USER_ROLE => Ok(Role::User),
            EXTERNAL_MODEL_ROLE => Ok(Role::Assistant),
            other => Err(Error::InvariantViolation(format!(
                "unknown external role '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(Error::InvariantViolation(format!("unknown role '{other}'"))),
        }
    }
}

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Unrounded cost of the exchange that produced this turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            usage: None,
            cost: None,
            created_at: Utc::now(),
        }
    }
}

/// A message in the generation service's format: `{role, parts: [text]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalMessage {
    pub role: String,
    pub parts: Vec<String>,
}

/// Ordered, append-only turn history. The sole conversation state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn without usage data.
    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) -> &Turn {
        self.push(Turn::new(role, content))
    }

    /// Append an assistant turn carrying the usage and cost of its exchange.
    pub fn append_assistant(
        &mut self,
        content: impl Into<String>,
        usage: Option<TokenUsage>,
        cost: Option<f64>,
    ) -> &Turn {
        let mut turn = Turn::new(Role::Assistant, content);
        turn.usage = usage;
        turn.cost = cost;
        self.push(turn)
    }

    fn push(&mut self, turn: Turn) -> &Turn {
        self.turns.push(turn);
        &self.turns[self.turns.len() - 1]
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

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// The whole history in external format.
    pub fn to_external_format(&self) -> Vec<ExternalMessage> {
        to_external(&self.turns)
    }

    /// Split the history for a generation call.
    ///
    /// Returns the prior history (every turn except the last) in external
    /// format, and the content of the last turn, which must be the pending
    /// user message.
    pub fn pending_exchange(&self) -> Result<(Vec<ExternalMessage>, &str)> {
        let (pending, prior) = self.turns.split_last().ok_or_else(|| {
            Error::InvariantViolation("no pending user turn in conversation".to_string())
        })?;
        if pending.role != Role::User {
            return Err(Error::InvariantViolation(format!(
                "pending turn must be a user turn, found '{}'",
                pending.role
            )));
        }
        Ok((to_external(prior), pending.content.as_str()))
    }

    /// Rebuild a conversation from external-format messages.
    ///
    /// Multi-part messages are joined with newlines.
    pub fn from_external_format(messages: &[ExternalMessage]) -> Result<Self> {
        let turns = messages
            .iter()
            .map(|m| Ok(Turn::new(Role::from_external(&m.role)?, m.parts.join("\n"))))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { turns })
    }
}

fn to_external(turns: &[Turn]) -> Vec<ExternalMessage> {
    turns
        .iter()
        .map(|t| ExternalMessage {
            role: t.role.to_external().to_string(),
            parts: vec![t.content.clone()],
        })
        .collect()
}
