use async_trait::async_trait;
use threadline_core::{ConversationTurn, Result, StreamError, StreamStatus, TurnId};

/// Durable message storage.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Delete every persisted turn strictly after `turn_id`.
    ///
    /// Must succeed as a no-op when the turn has no descendants.
    async fn delete_turns_after(&self, turn_id: &TurnId) -> Result<()>;
}

/// The streaming model backend.
///
/// Both calls only start work; progress is reported through the session's
/// [`StreamStatus`], not through the return value.
#[async_trait]
pub trait Generation: Send + Sync {
    /// Resume streaming from the current (truncated) sequence.
    async fn regenerate(&self) -> Result<()>;

    /// Submit new user input.
    async fn send_message(&self, content: String) -> Result<()>;
}

/// The session/view controller that owns the turn sequence.
pub trait SessionView {
    fn turns(&self) -> &[ConversationTurn];

    fn status(&self) -> StreamStatus;

    fn error(&self) -> Option<&StreamError>;

    fn is_authenticated(&self) -> bool;

    fn replace_turns(&mut self, turns: Vec<ConversationTurn>);

    fn replace_suggestions(&mut self, suggestions: Vec<String>);
}
