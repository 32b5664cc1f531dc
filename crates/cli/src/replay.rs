//! Scripted replay of a streaming conversation.
//!
//! A script is JSONL, one event per line. Blank lines and lines starting with
//! `#` are ignored:
//!
//! ```text
//! {"event":"user","id":"u1","text":"hello"}
//! {"event":"status","status":"submitted"}
//! {"event":"assistant_start","id":"a1"}
//! {"event":"status","status":"streaming"}
//! {"event":"part","part":{"type":"reasoning","text":"thinking"}}
//! {"event":"text","delta":"Hi"}
//! {"event":"advance","ms":200}
//! ```
//!
//! Time is virtual: scroll deadlines only pass on `advance`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use threadline_core::logging::{PrivacyConfig, redact_content};
use threadline_core::{Config, ConversationTurn, Part, StreamError, StreamStatus, TurnId};
use threadline_transcript::{
    InMemoryPersistence, InMemorySession, ReasoningToggle, RecordingGeneration, ScrollAction, StreamingTranscript,
    TranscriptPolicy,
};
use tokio::time::Instant;

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Append a user turn
    User {
        #[serde(default)]
        id: String,
        text: String,
    },
    /// Append an empty assistant turn
    AssistantStart {
        #[serde(default)]
        id: String,
    },
    /// Append a part to the last turn
    Part { part: Part },
    /// Extend the last turn's text
    Text { delta: String },
    Status { status: StreamStatus },
    /// Attach a stream error and move to `errored`
    Error { message: String },
    ClearError,
    Authenticate { authenticated: bool },
    /// Move the virtual clock forward, firing due scrolls on the way
    Advance { ms: u64 },
    Retry {
        #[serde(default)]
        fail_delete: Option<String>,
        #[serde(default)]
        fail_regenerate: Option<String>,
    },
    ToggleReasoning {
        turn: usize,
        part: usize,
        #[serde(default)]
        fullscreen: bool,
    },
    /// Submit user input through the generation backend
    Send { text: String },
}

impl ScriptEvent {
    /// Short human-readable name used in step reports.
    pub fn label(&self) -> String {
        match self {
            ScriptEvent::User { id, .. } => format!("user {}", display_id(id)),
            ScriptEvent::AssistantStart { id } => format!("assistant {}", display_id(id)),
            ScriptEvent::Part { part } => format!("part {}", part.tag()),
            ScriptEvent::Text { delta } => format!("text +{}", delta.chars().count()),
            ScriptEvent::Status { status } => format!("status {}", status),
            ScriptEvent::Error { .. } => "error".to_string(),
            ScriptEvent::ClearError => "clear error".to_string(),
            ScriptEvent::Authenticate { authenticated } => format!("authenticated={}", authenticated),
            ScriptEvent::Advance { ms } => format!("advance {}ms", ms),
            ScriptEvent::Retry { .. } => "retry".to_string(),
            ScriptEvent::ToggleReasoning { turn, part, fullscreen } => {
                let which = if *fullscreen { "fullscreen" } else { "expanded" };
                format!("toggle {} {}:{}", which, turn, part)
            }
            ScriptEvent::Send { .. } => "send".to_string(),
        }
    }
}

fn display_id(id: &str) -> &str {
    if id.trim().is_empty() { "(local)" } else { id }
}

/// Parse a JSONL script.
pub fn parse_script(source: &str) -> Result<Vec<ScriptEvent>> {
    source
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line.trim()).with_context(|| format!("Invalid event on line {}", index + 1))
        })
        .collect()
}

/// What one script step produced.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub at_ms: u64,
    pub event: String,
    pub policy: TranscriptPolicy,
    pub scroll: Vec<ScrollAction>,
    pub notes: Vec<String>,
}

/// Drives a [`StreamingTranscript`] from script events against in-memory
/// collaborators.
pub struct Replay {
    session: InMemorySession,
    transcript: StreamingTranscript,
    persistence: InMemoryPersistence,
    generation: RecordingGeneration,
    privacy: PrivacyConfig,
    start: Instant,
    elapsed: Duration,
    resume: bool,
}

impl Replay {
    /// With `resume`, the first displayable content is treated as a
    /// conversation loaded from storage and gets the instant initial scroll.
    pub fn new(config: &Config, resume: bool) -> Self {
        let logging = threadline_core::logging::LoggingConfig::from(config.logging.clone());
        Self {
            session: InMemorySession::new(Vec::new()),
            transcript: StreamingTranscript::new(config),
            persistence: InMemoryPersistence::default(),
            generation: RecordingGeneration::new(),
            privacy: logging.privacy,
            start: Instant::now(),
            elapsed: Duration::ZERO,
            resume,
        }
    }

    /// The session as the script has left it so far.
    pub fn session(&self) -> &InMemorySession {
        &self.session
    }

    /// Calls the replay made to the generation backend.
    pub fn generation(&self) -> &RecordingGeneration {
        &self.generation
    }

    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    fn at_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    fn last_turn_mut(&mut self) -> Result<&mut ConversationTurn> {
        self.session.turns.last_mut().context("Event needs a turn but the transcript is empty")
    }

    fn append_turn(&mut self, turn: ConversationTurn) {
        if let Some(id) = turn.durable_id() {
            self.persistence.push(id.clone());
        }
        self.session.turns.push(turn);
    }

    /// Apply one event and report the resulting policy and scrolls.
    pub async fn apply(&mut self, event: ScriptEvent) -> Result<StepReport> {
        let label = event.label();
        let mut notes = Vec::new();
        let mut scroll = Vec::new();
        let mut changed = true;

        match event {
            ScriptEvent::User { id, text } => {
                tracing::debug!(content = %redact_content(&text, &self.privacy), "user turn");
                self.append_turn(ConversationTurn::user(id, text));
            }
            ScriptEvent::AssistantStart { id } => self.append_turn(ConversationTurn::assistant(id, Vec::new())),
            ScriptEvent::Part { part } => self.last_turn_mut()?.push_part(part),
            ScriptEvent::Text { delta } => {
                tracing::trace!(content = %redact_content(&delta, &self.privacy), "text delta");
                self.last_turn_mut()?.push_text_delta(&delta);
            }
            ScriptEvent::Status { status } => self.session.status = status,
            ScriptEvent::Error { message } => {
                self.session.error = Some(StreamError::new(message));
                self.session.status = StreamStatus::Errored;
            }
            ScriptEvent::ClearError => self.session.error = None,
            ScriptEvent::Authenticate { authenticated } => {
                self.session.authenticated = authenticated;
                changed = false;
            }
            ScriptEvent::Advance { ms } => {
                let target = self.elapsed + Duration::from_millis(ms);
                while let Some(deadline) = self.transcript.next_scroll_deadline() {
                    let offset = deadline.saturating_duration_since(self.start);
                    if offset > target {
                        break;
                    }
                    self.elapsed = self.elapsed.max(offset);
                    scroll.extend(self.transcript.poll_scroll(&self.session, self.now()));
                }
                self.elapsed = target;
                changed = false;
            }
            ScriptEvent::Retry { .. } if !self.transcript.can_offer_retry(&self.session) => {
                notes.push(format!("retry not offered (retry state {})", self.transcript.retry_state()));
                changed = false;
            }
            ScriptEvent::Retry { fail_delete, fail_regenerate } => {
                self.persistence.set_failure(fail_delete.as_deref());
                self.generation.set_failure(fail_regenerate.as_deref());

                let now = self.now();
                let report = self.transcript.retry(&mut self.session, &self.persistence, &self.generation, now).await;

                self.persistence.set_failure(None);
                self.generation.set_failure(None);

                if let Some(deletion) = &report.deletion {
                    notes.push(format!("deletion: {:?}", deletion));
                }
                match report.outcome {
                    Ok(()) => {
                        // the backend acknowledges the request before any part arrives
                        self.session.status = StreamStatus::Submitted;
                        self.session.error = None;
                        notes.push("regenerating".to_string());
                    }
                    Err(failure) => notes.push(format!("retry failed: {}", failure)),
                }
            }
            ScriptEvent::ToggleReasoning { turn, part, fullscreen } => {
                let toggle = if fullscreen { ReasoningToggle::Fullscreen } else { ReasoningToggle::Expanded };
                match self.transcript.toggle_reasoning(&self.session, turn, part, toggle) {
                    Some(state) => {
                        notes.push(format!("reasoning expanded={} fullscreen={}", state.expanded, state.fullscreen))
                    }
                    None => notes.push(format!("part {}:{} is not reasoning", turn, part)),
                }
                changed = false;
            }
            ScriptEvent::Send { text } => match self.transcript.send_message(&self.generation, &text).await {
                Ok(()) => {
                    self.append_turn(ConversationTurn::user(TurnId::default(), text));
                    self.session.status = StreamStatus::Submitted;
                    self.session.error = None;
                }
                Err(e) => {
                    notes.push(format!("send rejected: {}", e));
                    changed = false;
                }
            },
        }

        if changed {
            let now = self.now();
            self.transcript.observe(&self.session, now);
            if self.resume
                && let Some(action) = self.transcript.restore(&self.session)
            {
                scroll.push(action);
            }
            scroll.extend(self.transcript.poll_scroll(&self.session, now));
        }

        Ok(StepReport {
            at_ms: self.at_ms(),
            event: label,
            policy: self.transcript.policy(&self.session),
            scroll,
            notes,
        })
    }

    /// Run every event, then let pending scrolls settle.
    pub async fn run(&mut self, events: Vec<ScriptEvent>) -> Result<Vec<StepReport>> {
        let mut reports = Vec::with_capacity(events.len() + 1);
        for (index, event) in events.into_iter().enumerate() {
            let report = self.apply(event).await.with_context(|| format!("Event {} failed", index + 1))?;
            reports.push(report);
        }

        if let Some(deadline) = self.transcript.next_scroll_deadline() {
            let remaining = deadline.saturating_duration_since(self.now());
            let ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
            reports.push(self.apply(ScriptEvent::Advance { ms }).await?);
        }

        self.transcript.teardown();
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_transcript::{ScrollBehavior, ScrollTarget};

    const SCRIPT: &str = r#"
# streamed reply that dies halfway
{"event":"user","id":"u1","text":"A"}
{"event":"status","status":"submitted"}
{"event":"assistant_start","id":"a1"}
{"event":"status","status":"streaming"}
{"event":"part","part":{"type":"reasoning","text":"hmm"}}
{"event":"text","delta":"B"}
{"event":"error","message":"connection reset"}
"#;

    fn replay(script: &str, resume: bool) -> (Replay, Vec<StepReport>) {
        let mut replay = Replay::new(&Config::default(), resume);
        let events = parse_script(script).unwrap();
        let reports = tokio_test::block_on(replay.run(events)).unwrap();
        (replay, reports)
    }

    #[test]
    fn test_parse_script_skips_comments_and_blank_lines() {
        let events = parse_script(SCRIPT).unwrap();
        assert_eq!(events.len(), 7);
        assert_eq!(events[0], ScriptEvent::User { id: "u1".to_string(), text: "A".to_string() });
        assert_eq!(events[4], ScriptEvent::Part { part: Part::reasoning("hmm") });
    }

    #[test]
    fn test_parse_script_reports_line() {
        let err = parse_script("{\"event\":\"status\",\"status\":\"ready\"}\n{\"event\":\"nope\"}").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_replay_reaches_error_state() {
        let (replay, reports) = replay(SCRIPT, false);
        let last = &reports[6];

        assert!(last.policy.has_error);
        assert!(last.policy.should_offer_retry());
        assert_eq!(replay.session().turns.len(), 2);
        assert_eq!(replay.session().turns[1].plain_text(), "B");
    }

    #[test]
    fn test_replay_retry_truncates() {
        let script = format!("{}\n{}", SCRIPT, r#"{"event":"retry"}"#);
        let (replay, reports) = replay(&script, false);
        let last = reports.iter().rev().find(|r| r.event == "retry").unwrap();

        assert_eq!(replay.session().turns.len(), 1);
        assert_eq!(replay.generation().regenerate_calls(), 1);
        assert_eq!(last.policy.status, StreamStatus::Submitted);
        assert!(last.notes.iter().any(|note| note.contains("Deleted")));
    }

    #[test]
    fn test_retry_skipped_while_streaming() {
        let script = r#"
{"event":"user","id":"u1","text":"A"}
{"event":"status","status":"streaming"}
{"event":"assistant_start","id":"a1"}
{"event":"text","delta":"B"}
{"event":"retry"}
"#;
        let (replay, reports) = replay(script, false);
        assert_eq!(replay.generation().regenerate_calls(), 0);
        assert_eq!(replay.session().turns.len(), 2);
        assert!(reports[4].notes[0].starts_with("retry not offered"));
    }

    #[test]
    fn test_failed_retry_scrolls_at_that_step() {
        let script = format!(
            "{}\n{}\n{}",
            SCRIPT, r#"{"event":"advance","ms":5000}"#, r#"{"event":"retry","fail_regenerate":"quota"}"#
        );
        let (_, reports) = replay(&script, false);
        let retry = reports.iter().find(|r| r.event == "retry").unwrap();

        assert_eq!(retry.at_ms, 5000);
        assert!(retry.notes.iter().any(|note| note.contains("quota")));
        assert!(retry.scroll.contains(&ScrollAction::smooth(ScrollTarget::Transcript)));
    }

    #[test]
    fn test_advance_fires_debounced_scroll() {
        let script = r#"
{"event":"user","id":"u1","text":"A"}
{"event":"status","status":"streaming"}
{"event":"assistant_start","id":"a1"}
{"event":"advance","ms":50}
{"event":"advance","ms":100}
"#;
        let (_, reports) = replay(script, false);
        assert!(reports[3].scroll.is_empty());
        assert_eq!(reports[4].scroll, vec![ScrollAction::smooth(ScrollTarget::Transcript)]);
        assert_eq!(reports[4].at_ms, 150);
    }

    #[test]
    fn test_resume_scrolls_instantly_once() {
        let script = r#"
{"event":"user","id":"u1","text":"saved question"}
{"event":"assistant_start","id":"a1"}
{"event":"text","delta":"saved answer"}
"#;
        let (_, reports) = replay(script, true);
        let instant: Vec<&ScrollAction> = reports
            .iter()
            .flat_map(|r| r.scroll.iter())
            .filter(|action| action.behavior == ScrollBehavior::Instant)
            .collect();
        assert_eq!(instant.len(), 1);
    }

    #[test]
    fn test_send_appends_local_turn() {
        let script = r#"
{"event":"send","text":"  hi  "}
{"event":"send","text":"   "}
"#;
        let (replay, reports) = replay(script, false);
        assert_eq!(replay.session().turns.len(), 1);
        assert!(replay.session().turns[0].durable_id().is_none());
        assert_eq!(replay.generation().sent_messages(), vec!["  hi  ".to_string()]);
        assert!(reports[1].notes[0].starts_with("send rejected"));
    }
}
