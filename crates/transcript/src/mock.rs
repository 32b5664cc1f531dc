//! In-memory collaborators for tests and script replay

use crate::retry::{Generation, Persistence, SessionView};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use threadline_core::{ConversationTurn, Error, Result, StreamError, StreamStatus, TurnId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Persistence backed by an ordered list of stored turn ids.
#[derive(Debug, Default)]
pub struct InMemoryPersistence {
    persisted: Mutex<Vec<TurnId>>,
    delete_calls: Mutex<Vec<TurnId>>,
    failure: Mutex<Option<String>>,
}

impl InMemoryPersistence {
    /// Storage holding `persisted` in conversation order.
    pub fn new(persisted: Vec<TurnId>) -> Self {
        Self { persisted: Mutex::new(persisted), ..Self::default() }
    }

    /// Store the durable ids of `turns`, in order.
    pub fn with_turns(turns: &[ConversationTurn]) -> Self {
        Self::new(turns.iter().filter_map(|turn| turn.durable_id().cloned()).collect())
    }

    /// Record a newly saved turn.
    pub fn push(&self, turn_id: TurnId) {
        lock(&self.persisted).push(turn_id);
    }

    /// Make every later delete fail with `message`, or succeed again with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        *lock(&self.failure) = message.map(str::to_string);
    }

    /// Ids currently held in storage.
    pub fn persisted(&self) -> Vec<TurnId> {
        lock(&self.persisted).clone()
    }

    /// Every id passed to `delete_turns_after`, including failed calls.
    pub fn delete_calls(&self) -> Vec<TurnId> {
        lock(&self.delete_calls).clone()
    }
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn delete_turns_after(&self, turn_id: &TurnId) -> Result<()> {
        lock(&self.delete_calls).push(turn_id.clone());

        if let Some(message) = lock(&self.failure).clone() {
            return Err(Error::Persistence(message));
        }

        let mut persisted = lock(&self.persisted);
        if let Some(position) = persisted.iter().position(|id| id == turn_id) {
            persisted.truncate(position + 1);
        }
        Ok(())
    }
}

/// Generation backend that records calls instead of streaming.
#[derive(Debug, Default)]
pub struct RecordingGeneration {
    regenerate_calls: AtomicUsize,
    sent: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl RecordingGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make later calls fail with `message`, or succeed again with `None`.
    pub fn set_failure(&self, message: Option<&str>) {
        *lock(&self.failure) = message.map(str::to_string);
    }

    /// Number of regenerate requests received, failed ones included.
    pub fn regenerate_calls(&self) -> usize {
        self.regenerate_calls.load(Ordering::SeqCst)
    }

    /// Every message accepted by `send_message`, in order.
    pub fn sent_messages(&self) -> Vec<String> {
        lock(&self.sent).clone()
    }

    fn check_failure(&self) -> Result<()> {
        match lock(&self.failure).clone() {
            Some(message) => Err(Error::Generation(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Generation for RecordingGeneration {
    async fn regenerate(&self) -> Result<()> {
        self.regenerate_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()
    }

    async fn send_message(&self, content: String) -> Result<()> {
        self.check_failure()?;
        lock(&self.sent).push(content);
        Ok(())
    }
}

/// Plain-data session.
#[derive(Debug, Clone, Default)]
pub struct InMemorySession {
    pub turns: Vec<ConversationTurn>,
    pub status: StreamStatus,
    pub error: Option<StreamError>,
    pub authenticated: bool,
    pub suggestions: Vec<String>,
}

impl InMemorySession {
    /// An authenticated, ready session holding `turns`.
    pub fn new(turns: Vec<ConversationTurn>) -> Self {
        Self { turns, authenticated: true, ..Self::default() }
    }
}

impl SessionView for InMemorySession {
    fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    fn status(&self) -> StreamStatus {
        self.status
    }

    fn error(&self) -> Option<&StreamError> {
        self.error.as_ref()
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    fn replace_turns(&mut self, turns: Vec<ConversationTurn>) {
        self.turns = turns;
    }

    fn replace_suggestions(&mut self, suggestions: Vec<String>) {
        self.suggestions = suggestions;
    }
}
