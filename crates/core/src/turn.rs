use crate::part::Part;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a conversation turn.
///
/// A blank id marks a turn that exists only locally and has never been
/// assigned a durable (persisted) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the id can be handed to the persistence layer.
    pub fn is_durable(&self) -> bool {
        !self.0.trim().is_empty()
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TurnId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TurnId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Author of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions injected by the host; never displayed
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Roles that the transcript renders.
    pub fn is_displayable(&self) -> bool {
        matches!(self, Role::User | Role::Assistant)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One message in the conversation.
///
/// Parts are only ever appended while the turn streams; once settled, a turn
/// changes only by being replaced wholesale through a retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: TurnId,
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl ConversationTurn {
    /// Build a turn from its parts.
    pub fn new(id: impl Into<TurnId>, role: Role, parts: Vec<Part>) -> Self {
        Self { id: id.into(), role, parts }
    }

    /// A user turn with a single text part.
    pub fn user(id: impl Into<TurnId>, text: impl Into<String>) -> Self {
        Self::new(id, Role::User, vec![Part::text(text)])
    }

    /// An assistant turn; `parts` may be empty while the reply is pending.
    pub fn assistant(id: impl Into<TurnId>, parts: Vec<Part>) -> Self {
        Self::new(id, Role::Assistant, parts)
    }

    /// A system turn. Never displayed.
    pub fn system(id: impl Into<TurnId>, text: impl Into<String>) -> Self {
        Self::new(id, Role::System, vec![Part::text(text)])
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }

    /// The id, if it is durable enough to address persisted state.
    pub fn durable_id(&self) -> Option<&TurnId> {
        Some(&self.id).filter(|id| id.is_durable())
    }

    /// Append a part (streaming only ever appends).
    pub fn push_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Append streamed text to the last part, or start a new text part.
    pub fn push_text_delta(&mut self, delta: &str) {
        if let Some(last) = self.parts.last_mut()
            && last.is_text()
        {
            last.push_str(delta);
            return;
        }
        self.parts.push(Part::text(delta));
    }

    /// Concatenated non-blank text payloads.
    pub fn plain_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(Part::visible_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
