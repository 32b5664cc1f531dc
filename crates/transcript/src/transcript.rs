use crate::policy::TranscriptPolicy;
use crate::reasoning::{ReasoningSectionKey, ReasoningUiState, ReasoningVisibilityStore};
use crate::retry::{Generation, Persistence, RetryOrchestrator, RetryReport, RetryState, SessionView};
use crate::scroll::{ScrollAction, ScrollCoordinator};

use threadline_core::{Config, Error, Result};
use tokio::time::Instant;

/// Which reasoning toggle to flip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReasoningToggle {
    Expanded,
    Fullscreen,
}

/// Transcript state that lives next to a session view.
///
/// Owns the reasoning visibility store, the scroll coordinator and the retry
/// orchestrator. The session (turns, status, error) stays with the caller
/// and is passed in on every call.
#[derive(Debug)]
pub struct StreamingTranscript {
    config: Config,
    reasoning: ReasoningVisibilityStore,
    scroll: ScrollCoordinator,
    retry: RetryOrchestrator,
}

impl StreamingTranscript {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            reasoning: ReasoningVisibilityStore::new(),
            scroll: ScrollCoordinator::new(config.scroll.clone()),
            retry: RetryOrchestrator::new(config.retry.clone()),
        }
    }

    /// Config this transcript was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Derived render flags for the current session.
    pub fn policy<S: SessionView + ?Sized>(&self, session: &S) -> TranscriptPolicy {
        TranscriptPolicy::derive(session.turns(), session.status(), session.error())
    }

    /// Whether the retry affordance should be shown and enabled.
    pub fn can_offer_retry<S: SessionView + ?Sized>(&self, session: &S) -> bool {
        self.retry.can_retry() && self.policy(session).should_offer_retry()
    }

    /// Feed a change of turns or status to the scrollers.
    pub fn observe<S: SessionView + ?Sized>(&mut self, session: &S, now: Instant) {
        self.scroll.observe(session.turns(), session.status(), now);
    }

    /// Initial scroll for a conversation loaded from storage.
    pub fn restore<S: SessionView + ?Sized>(&mut self, session: &S) -> Option<ScrollAction> {
        self.scroll.restore(session.turns())
    }

    /// Scroll actions due at `now`.
    pub fn poll_scroll<S: SessionView + ?Sized>(&mut self, session: &S, now: Instant) -> Vec<ScrollAction> {
        self.scroll.poll(session.turns(), now)
    }

    /// When the owner should next call [`StreamingTranscript::poll_scroll`].
    pub fn next_scroll_deadline(&self) -> Option<Instant> {
        self.scroll.next_deadline()
    }

    pub fn reasoning(&self) -> &ReasoningVisibilityStore {
        &self.reasoning
    }

    pub fn reasoning_mut(&mut self) -> &mut ReasoningVisibilityStore {
        &mut self.reasoning
    }

    /// UI state of one reasoning part, or `None` if the part is not reasoning.
    pub fn reasoning_state<S: SessionView + ?Sized>(
        &self, session: &S, turn_index: usize, part_index: usize,
    ) -> Option<ReasoningUiState> {
        let key = reasoning_key(session, turn_index, part_index)?;
        Some(self.reasoning.get(&key))
    }

    /// Flip a toggle on part `part_index` of turn `turn_index`.
    ///
    /// Returns `None` without touching the store when that part does not
    /// exist or is not reasoning.
    pub fn toggle_reasoning<S: SessionView + ?Sized>(
        &mut self, session: &S, turn_index: usize, part_index: usize, toggle: ReasoningToggle,
    ) -> Option<ReasoningUiState> {
        let key = reasoning_key(session, turn_index, part_index)?;
        let state = match toggle {
            ReasoningToggle::Expanded => self.reasoning.toggle_expanded(key),
            ReasoningToggle::Fullscreen => self.reasoning.toggle_fullscreen(key),
        };
        Some(state)
    }

    /// Current state of the retry protocol.
    pub fn retry_state(&self) -> RetryState {
        self.retry.state()
    }

    /// Run the retry protocol, then drop reasoning state for discarded turns
    /// and re-arm the scrollers against the truncated sequence at `now`.
    pub async fn retry<S: SessionView + ?Sized>(
        &mut self, session: &mut S, persistence: &dyn Persistence, generation: &dyn Generation, now: Instant,
    ) -> RetryReport {
        let report = self.retry.retry(session, persistence, generation).await;

        if let Some(context) = &report.context {
            let evicted: usize = context.truncated_turns.iter().map(|id| self.reasoning.evict_turn(id)).sum();
            let evicted = evicted + self.reasoning.retain_turns(session.turns());
            if evicted > 0 {
                tracing::debug!(evicted, "reasoning state dropped for truncated turns");
            }
            self.scroll.observe(session.turns(), session.status(), now);
        }
        report
    }

    /// Submit user input. Blank input is rejected before reaching the backend.
    pub async fn send_message(&self, generation: &dyn Generation, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::Other("message is empty".to_string()));
        }
        generation.send_message(content.to_string()).await
    }

    /// Put the retry affordance back to idle, whatever the last run left behind.
    pub fn reset_retry(&mut self) {
        self.retry.reset();
    }

    /// Cancel pending scrolls, forget all reasoning state and reset retry.
    pub fn teardown(&mut self) {
        self.scroll.teardown();
        self.reasoning.clear();
        self.retry.reset();
    }

    pub fn is_torn_down(&self) -> bool {
        self.scroll.is_torn_down()
    }
}

fn reasoning_key<S: SessionView + ?Sized>(
    session: &S, turn_index: usize, part_index: usize,
) -> Option<ReasoningSectionKey> {
    let turn = session.turns().get(turn_index)?;
    let part = turn.parts.get(part_index)?;
    if !part.is_reasoning() {
        return None;
    }
    Some(ReasoningSectionKey::for_turn(turn, turn_index, part_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{InMemoryPersistence, InMemorySession, RecordingGeneration};
    use crate::scroll::ScrollTarget;
    use std::time::Duration;
    use threadline_core::{ConversationTurn, Part, StreamError, StreamStatus};

    fn session_with_reasoning() -> InMemorySession {
        InMemorySession::new(vec![
            ConversationTurn::user("u1", "why?"),
            ConversationTurn::assistant("a1", vec![Part::reasoning("thinking"), Part::text("because")]),
        ])
    }

    #[test]
    fn test_toggle_reasoning_only_on_reasoning_parts() {
        let session = session_with_reasoning();
        let mut transcript = StreamingTranscript::new(&Config::default());

        let state = transcript.toggle_reasoning(&session, 1, 0, ReasoningToggle::Expanded).unwrap();
        assert!(state.expanded);
        assert!(!state.fullscreen);

        assert_eq!(transcript.toggle_reasoning(&session, 1, 1, ReasoningToggle::Expanded), None);
        assert_eq!(transcript.toggle_reasoning(&session, 0, 0, ReasoningToggle::Expanded), None);
        assert_eq!(transcript.toggle_reasoning(&session, 9, 0, ReasoningToggle::Fullscreen), None);
        assert_eq!(transcript.reasoning().len(), 1);

        let state = transcript.toggle_reasoning(&session, 1, 0, ReasoningToggle::Fullscreen).unwrap();
        assert!(state.expanded && state.fullscreen);
        assert_eq!(transcript.reasoning_state(&session, 1, 0), Some(state));
    }

    #[test]
    fn test_retry_evicts_truncated_reasoning_state() {
        let mut session = session_with_reasoning();
        session.status = StreamStatus::Errored;
        session.error = Some(StreamError::new("boom"));
        let persistence = InMemoryPersistence::with_turns(&session.turns);
        let generation = RecordingGeneration::new();
        let mut transcript = StreamingTranscript::new(&Config::default());

        transcript.toggle_reasoning(&session, 1, 0, ReasoningToggle::Expanded);
        assert!(transcript.can_offer_retry(&session));

        let report = tokio_test::block_on(transcript.retry(&mut session, &persistence, &generation, Instant::now()));
        assert!(report.is_success());
        assert!(transcript.reasoning().is_empty());
        assert_eq!(transcript.retry_state(), RetryState::Idle);

        session.turns.push(ConversationTurn::assistant("a2", vec![Part::reasoning("again")]));
        assert_eq!(transcript.reasoning_state(&session, 1, 0), Some(ReasoningUiState::default()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observe_and_poll() {
        let mut session = session_with_reasoning();
        session.status = StreamStatus::Streaming;
        let mut transcript = StreamingTranscript::new(&Config::default());
        let t0 = Instant::now();

        transcript.observe(&session, t0);
        assert_eq!(transcript.next_scroll_deadline(), Some(t0 + Duration::from_millis(100)));

        let actions = transcript.poll_scroll(&session, t0 + Duration::from_millis(200));
        assert_eq!(actions, vec![ScrollAction::smooth(ScrollTarget::Transcript)]);
    }

    #[test]
    fn test_send_message_rejects_blank_input() {
        let transcript = StreamingTranscript::new(&Config::default());
        let generation = RecordingGeneration::new();

        assert!(tokio_test::block_on(transcript.send_message(&generation, "   ")).is_err());
        tokio_test::block_on(transcript.send_message(&generation, " hi ")).unwrap();
        assert_eq!(generation.sent_messages(), vec![" hi ".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_rearms_scroll_on_caller_clock() {
        let mut session = session_with_reasoning();
        session.status = StreamStatus::Errored;
        session.error = Some(StreamError::new("boom"));
        let persistence = InMemoryPersistence::with_turns(&session.turns);
        let generation = RecordingGeneration::new();
        generation.set_failure(Some("quota exceeded"));
        let mut transcript = StreamingTranscript::new(&Config::default());
        let t0 = Instant::now();

        transcript.observe(&session, t0);
        transcript.poll_scroll(&session, t0);
        assert_eq!(transcript.next_scroll_deadline(), None);

        tokio::time::advance(Duration::from_secs(5)).await;
        let report = transcript.retry(&mut session, &persistence, &generation, t0).await;
        assert!(!report.is_success());

        assert_eq!(transcript.next_scroll_deadline(), Some(t0));
        let actions = transcript.poll_scroll(&session, t0);
        assert_eq!(actions, vec![ScrollAction::smooth(ScrollTarget::Transcript)]);
    }

    struct StalledPersistence;

    #[async_trait::async_trait]
    impl Persistence for StalledPersistence {
        async fn delete_turns_after(&self, _turn_id: &threadline_core::TurnId) -> Result<()> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_retry_can_be_offered_again() {
        let mut session = session_with_reasoning();
        session.status = StreamStatus::Errored;
        session.error = Some(StreamError::new("boom"));
        let generation = RecordingGeneration::new();
        let mut transcript = StreamingTranscript::new(&Config::default());

        let pending = transcript.retry(&mut session, &StalledPersistence, &generation, Instant::now());
        assert!(tokio::time::timeout(Duration::from_millis(10), pending).await.is_err());
        assert_eq!(transcript.retry_state(), RetryState::Failed);
        assert!(transcript.can_offer_retry(&session));

        let persistence = InMemoryPersistence::with_turns(&session.turns);
        let report = transcript.retry(&mut session, &persistence, &generation, Instant::now()).await;
        assert!(report.is_success());
        assert_eq!(generation.regenerate_calls(), 1);
    }

    #[test]
    fn test_reset_retry() {
        let mut transcript = StreamingTranscript::new(&Config::default());
        transcript.reset_retry();
        assert_eq!(transcript.retry_state(), RetryState::Idle);
    }

    #[test]
    fn test_teardown() {
        let session = session_with_reasoning();
        let mut transcript = StreamingTranscript::new(&Config::default());
        transcript.toggle_reasoning(&session, 1, 0, ReasoningToggle::Expanded);
        assert!(transcript.restore(&session).is_some());

        transcript.teardown();
        assert!(transcript.is_torn_down());
        assert!(transcript.reasoning().is_empty());
        assert_eq!(transcript.next_scroll_deadline(), None);
    }
}
