use super::scheduler::DebounceScheduler;
use crate::classifier::any_reasoning_active;

use serde::Serialize;
use std::time::Duration;
use threadline_core::{ConversationTurn, ScrollConfig, StreamStatus};
use tokio::time::Instant;

/// Viewport a scroll action applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollTarget {
    /// The main transcript
    Transcript,
    /// The reasoning sub-panel
    Reasoning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

/// Instruction to move a viewport to its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScrollAction {
    pub target: ScrollTarget,
    pub behavior: ScrollBehavior,
}

impl ScrollAction {
    /// Animated scroll to the end of `target`.
    pub fn smooth(target: ScrollTarget) -> Self {
        Self { target, behavior: ScrollBehavior::Smooth }
    }

    /// Jump straight to the end of `target`.
    pub fn instant(target: ScrollTarget) -> Self {
        Self { target, behavior: ScrollBehavior::Instant }
    }
}

/// Decides when the transcript and the reasoning panel follow the stream.
///
/// Both scrollers are trailing-debounced while the stream is live and run on
/// the next poll otherwise. The coordinator never sleeps; the owner calls
/// [`ScrollCoordinator::observe`] on every change and
/// [`ScrollCoordinator::poll`] whenever [`ScrollCoordinator::next_deadline`]
/// passes.
#[derive(Debug)]
pub struct ScrollCoordinator {
    config: ScrollConfig,
    scheduler: DebounceScheduler<ScrollTarget>,
    last_visible_count: Option<usize>,
    last_status: Option<StreamStatus>,
    initial_scroll_done: bool,
    torn_down: bool,
}

impl ScrollCoordinator {
    pub fn new(config: ScrollConfig) -> Self {
        Self {
            config,
            scheduler: DebounceScheduler::new(),
            last_visible_count: None,
            last_status: None,
            initial_scroll_done: false,
            torn_down: false,
        }
    }

    fn transcript_delay(&self, status: StreamStatus) -> Duration {
        if status == StreamStatus::Streaming { self.config.transcript_debounce() } else { Duration::ZERO }
    }

    fn reasoning_delay(&self, status: StreamStatus) -> Duration {
        if status == StreamStatus::Streaming { self.config.reasoning_debounce() } else { Duration::ZERO }
    }

    /// Record a change to the turn sequence or the stream status.
    ///
    /// The transcript scroller is re-armed when the visible-turn count or the
    /// status differs from the last observation; the reasoning scroller is
    /// re-armed on every call.
    pub fn observe(&mut self, turns: &[ConversationTurn], status: StreamStatus, now: Instant) {
        if self.torn_down {
            return;
        }

        let visible_count = turns.iter().filter(|turn| turn.role.is_displayable()).count();
        if self.last_visible_count != Some(visible_count) || self.last_status != Some(status) {
            let delay = self.transcript_delay(status);
            self.scheduler.schedule(ScrollTarget::Transcript, delay, now);
            tracing::trace!(visible_count, %status, ?delay, "transcript scroll armed");
        }
        self.last_visible_count = Some(visible_count);
        self.last_status = Some(status);

        let delay = self.reasoning_delay(status);
        self.scheduler.schedule(ScrollTarget::Reasoning, delay, now);
    }

    /// One-shot instant scroll for a conversation loaded from storage.
    ///
    /// Returns `None` once it has fired, when disabled, when there is nothing
    /// to show, or after teardown.
    pub fn restore(&mut self, turns: &[ConversationTurn]) -> Option<ScrollAction> {
        if self.torn_down || self.initial_scroll_done || !self.config.initial_scroll {
            return None;
        }
        if !turns.iter().any(|turn| turn.role.is_displayable()) {
            return None;
        }

        self.initial_scroll_done = true;
        tracing::debug!(turns = turns.len(), "initial scroll to end of restored conversation");
        Some(ScrollAction::instant(ScrollTarget::Transcript))
    }

    /// Run every scroller whose delay has elapsed.
    ///
    /// The reasoning scroller re-checks `turns` at fire time and is dropped if
    /// no reasoning segment is still active.
    pub fn poll(&mut self, turns: &[ConversationTurn], now: Instant) -> Vec<ScrollAction> {
        if self.torn_down {
            return Vec::new();
        }

        let mut actions = Vec::new();
        for (target, _) in self.scheduler.take_due(now) {
            match target {
                ScrollTarget::Transcript => actions.push(ScrollAction::smooth(target)),
                ScrollTarget::Reasoning => {
                    if any_reasoning_active(turns) {
                        actions.push(ScrollAction::smooth(target));
                    } else {
                        tracing::trace!("reasoning scroll skipped, no active segment");
                    }
                }
            }
        }
        actions
    }

    /// Earliest pending fire time, or `None` when idle or torn down.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.torn_down { None } else { self.scheduler.next_deadline() }
    }

    /// Whether `target` has a scroll waiting to fire.
    pub fn is_pending(&self, target: ScrollTarget) -> bool {
        self.scheduler.is_pending(target)
    }

    /// Cancel both scrollers and ignore all later calls.
    pub fn teardown(&mut self) {
        let cancelled = self.scheduler.cancel_all();
        self.torn_down = true;
        tracing::debug!(cancelled, "scroll coordinator torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Whether the one-shot restore scroll has fired.
    pub fn initial_scroll_done(&self) -> bool {
        self.initial_scroll_done
    }
}

impl Default for ScrollCoordinator {
    fn default() -> Self {
        Self::new(ScrollConfig::default())
    }
}
