use super::collaborators::{Generation, Persistence, SessionView};
use crate::policy::last_user_index;

use serde::Serialize;
use std::fmt;
use threadline_core::{RetryConfig, TurnId};

/// Where the retry protocol currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryState {
    #[default]
    Idle,
    /// Waiting on the persistence layer to purge the stale tail
    Deleting,
    /// Replacing the local sequence and clearing suggestions
    Truncating,
    /// Asking the generation backend to stream again
    Regenerating,
    /// The last attempt failed; a new attempt may start
    Failed,
}

impl RetryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryState::Idle => "idle",
            RetryState::Deleting => "deleting",
            RetryState::Truncating => "truncating",
            RetryState::Regenerating => "regenerating",
            RetryState::Failed => "failed",
        }
    }

    /// A protocol run is underway.
    pub fn is_busy(&self) -> bool {
        matches!(self, RetryState::Deleting | RetryState::Truncating | RetryState::Regenerating)
    }
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What one retry run worked from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryContext {
    pub last_user_turn_id: TurnId,
    /// Source index of the last user turn.
    pub last_user_index: usize,
    /// Ids of the turns dropped from the local sequence.
    pub truncated_turns: Vec<TurnId>,
}

/// Why the persistence step did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Unauthenticated,
    NoDurableId,
    Disabled,
}

/// Result of the persistence step. Never fatal to the protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletionOutcome {
    Deleted,
    Skipped(SkipReason),
    Failed(String),
}

/// Failures that end a retry run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryFailure {
    #[error("no user turn to retry from")]
    NoUserTurn,

    #[error("a retry is already in progress")]
    Busy,

    #[error("regenerate request failed: {0}")]
    Generation(String),
}

/// Everything one retry run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport {
    pub context: Option<RetryContext>,
    pub deletion: Option<DeletionOutcome>,
    pub outcome: std::result::Result<(), RetryFailure>,
}

impl RetryReport {
    fn failed(failure: RetryFailure) -> Self {
        Self { context: None, deletion: None, outcome: Err(failure) }
    }

    /// Whether regeneration was requested successfully.
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Retry/regenerate state machine.
///
/// A run goes idle -> deleting -> truncating -> regenerating -> idle, or ends
/// in `Failed`. A persistence failure is logged and the run continues, so
/// the local transcript recovers even when storage is unavailable. Nothing
/// a run encounters is returned as an `Err` to the caller.
#[derive(Debug, Default)]
pub struct RetryOrchestrator {
    config: RetryConfig,
    state: RetryState,
    attempts: u64,
}

impl RetryOrchestrator {
    pub fn new(config: RetryConfig) -> Self {
        Self { config, state: RetryState::Idle, attempts: 0 }
    }

    /// Current protocol state.
    pub fn state(&self) -> RetryState {
        self.state
    }

    /// False while a run is underway; bind the retry affordance to this.
    pub fn can_retry(&self) -> bool {
        !self.state.is_busy()
    }

    /// Runs started, including failed ones.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Return to `Idle` from any state, including one left by a dropped run.
    pub fn reset(&mut self) {
        if self.state.is_busy() {
            tracing::debug!(state = %self.state, "abandoned retry run reset");
        }
        self.state = RetryState::Idle;
    }

    /// Discard everything after the last user turn and regenerate from there.
    #[tracing::instrument(skip_all, fields(attempt = self.attempts + 1))]
    pub async fn retry<S>(
        &mut self, session: &mut S, persistence: &dyn Persistence, generation: &dyn Generation,
    ) -> RetryReport
    where
        S: SessionView + ?Sized,
    {
        if self.state.is_busy() {
            tracing::warn!(state = %self.state, "retry requested while another run is in progress");
            return RetryReport::failed(RetryFailure::Busy);
        }
        self.attempts += 1;
        let mut run = RunGuard { state: &mut self.state };
        run.transition(RetryState::Deleting);

        let turns = session.turns();
        let Some(index) = last_user_index(turns) else {
            tracing::warn!(turns = turns.len(), "retry aborted: no user turn in sequence");
            run.transition(RetryState::Failed);
            return RetryReport::failed(RetryFailure::NoUserTurn);
        };
        let last_user = &turns[index];
        let context = RetryContext {
            last_user_turn_id: last_user.id.clone(),
            last_user_index: index,
            truncated_turns: turns[index + 1..].iter().map(|turn| turn.id.clone()).collect(),
        };
        let durable_id = last_user.durable_id().cloned();

        let deletion = if !self.config.delete_persisted {
            DeletionOutcome::Skipped(SkipReason::Disabled)
        } else if !session.is_authenticated() {
            DeletionOutcome::Skipped(SkipReason::Unauthenticated)
        } else {
            match durable_id {
                None => DeletionOutcome::Skipped(SkipReason::NoDurableId),
                Some(id) => match persistence.delete_turns_after(&id).await {
                    Ok(()) => {
                        tracing::debug!(turn_id = %id, "persisted tail deleted");
                        DeletionOutcome::Deleted
                    }
                    Err(e) => {
                        tracing::warn!(turn_id = %id, "failed to delete persisted turns, continuing: {}", e);
                        DeletionOutcome::Failed(e.to_string())
                    }
                },
            }
        };

        run.transition(RetryState::Truncating);
        let turns = session.turns();
        let keep = last_user_index(turns).map_or(0, |index| index + 1);
        let truncated = turns[..keep].to_vec();
        tracing::info!(
            kept = truncated.len(),
            dropped = context.truncated_turns.len(),
            "transcript truncated to last user turn"
        );
        session.replace_turns(truncated);
        session.replace_suggestions(Vec::new());

        run.transition(RetryState::Regenerating);
        match generation.regenerate().await {
            Ok(()) => {
                run.transition(RetryState::Idle);
                RetryReport { context: Some(context), deletion: Some(deletion), outcome: Ok(()) }
            }
            Err(e) => {
                tracing::error!("regenerate request failed: {}", e);
                run.transition(RetryState::Failed);
                RetryReport {
                    context: Some(context),
                    deletion: Some(deletion),
                    outcome: Err(RetryFailure::Generation(e.to_string())),
                }
            }
        }
    }
}

/// Tracks the state of one run; a run dropped mid-flight ends in `Failed`.
struct RunGuard<'a> {
    state: &'a mut RetryState,
}

impl RunGuard<'_> {
    fn transition(&mut self, next: RetryState) {
        tracing::debug!(from = %self.state, to = %next, "retry state");
        *self.state = next;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.state.is_busy() {
            tracing::warn!(state = %self.state, "retry run dropped before completion");
            *self.state = RetryState::Failed;
        }
    }
}
