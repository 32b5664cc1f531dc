use crate::classifier::{has_tool_invocation, has_visible_text, is_skeleton};

use serde::Serialize;
use threadline_core::{ConversationTurn, Role, StreamError, StreamStatus};

/// Layout flags for one visible turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnRenderPolicy {
    pub role: Role,
    /// This is the assistant turn currently receiving parts.
    pub is_active: bool,
    /// Assistant turn with at most one part.
    pub is_skeleton: bool,
    /// Render compacted instead of reserving the full loader height.
    pub reduce_height: bool,
    /// Attach the retry affordance to this turn.
    pub show_retry: bool,
}

/// Everything the transcript derives from the turn sequence and stream status.
///
/// All indices refer to positions in the visible sequence, not the source
/// sequence; [`TranscriptPolicy::visible_indices`] maps them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptPolicy {
    pub status: StreamStatus,
    pub has_error: bool,
    /// Source positions of the displayable turns, in order.
    pub visible_indices: Vec<usize>,
    pub has_active_tool_invocations: bool,
    pub is_missing_assistant_response: bool,
    pub should_show_loading_indicator: bool,
    pub should_reserve_loader_min_height: bool,
    pub last_assistant_index: Option<usize>,
    pub active_assistant_index: Option<usize>,
    /// One entry per visible turn.
    pub turns: Vec<TurnRenderPolicy>,
}

impl TranscriptPolicy {
    /// Derive every display flag in one pass.
    pub fn derive(turns: &[ConversationTurn], status: StreamStatus, error: Option<&StreamError>) -> Self {
        let visible_indices: Vec<usize> = turns
            .iter()
            .enumerate()
            .filter(|(_, turn)| turn.role.is_displayable())
            .map(|(index, _)| index)
            .collect();
        let visible: Vec<&ConversationTurn> = visible_indices.iter().map(|&index| &turns[index]).collect();

        let last = visible.last().copied();
        let last_is_user = last.is_some_and(ConversationTurn::is_user);
        let last_is_assistant = last.is_some_and(ConversationTurn::is_assistant);
        let last_is_skeleton = last.is_some_and(is_skeleton);
        let streaming = status == StreamStatus::Streaming;
        let has_error = error.is_some() || status == StreamStatus::Errored;

        let has_active_tool_invocations = streaming && last_is_assistant && last.is_some_and(has_tool_invocation);

        let is_missing_assistant_response = status == StreamStatus::Ready
            && error.is_none()
            && (last_is_user
                || (last_is_assistant && last.is_some_and(|turn| !has_visible_text(turn) && !has_tool_invocation(turn))));

        let awaiting_content = status == StreamStatus::Submitted || (streaming && (last_is_user || last_is_skeleton));

        let last_assistant_index = visible.iter().rposition(|turn| turn.is_assistant());
        let active_assistant_index = if streaming && last_is_assistant { Some(visible.len() - 1) } else { None };

        let offer_retry = (has_error && !status.is_in_flight()) || is_missing_assistant_response;
        let last_visible = visible.len().checked_sub(1);

        let turn_policies = visible
            .iter()
            .enumerate()
            .map(|(index, turn)| {
                let skeleton = is_skeleton(turn);
                let is_active = active_assistant_index == Some(index);
                let reduce_height = turn.is_assistant()
                    && match status {
                        StreamStatus::Streaming => !(is_active && skeleton),
                        StreamStatus::Submitted => true,
                        StreamStatus::Ready | StreamStatus::Errored => last_assistant_index != Some(index),
                    };
                TurnRenderPolicy {
                    role: turn.role,
                    is_active,
                    is_skeleton: skeleton,
                    reduce_height,
                    show_retry: offer_retry && last_visible == Some(index),
                }
            })
            .collect();

        Self {
            status,
            has_error,
            visible_indices,
            has_active_tool_invocations,
            is_missing_assistant_response,
            should_show_loading_indicator: awaiting_content,
            should_reserve_loader_min_height: awaiting_content,
            last_assistant_index,
            active_assistant_index,
            turns: turn_policies,
        }
    }

    /// Number of displayable turns.
    pub fn visible_count(&self) -> usize {
        self.visible_indices.len()
    }

    /// Policy for the visible turn at `index`.
    pub fn turn(&self, index: usize) -> Option<&TurnRenderPolicy> {
        self.turns.get(index)
    }

    /// A stream error or a silent non-response is showing and can be retried.
    pub fn should_offer_retry(&self) -> bool {
        (self.has_error && !self.status.is_in_flight()) || self.is_missing_assistant_response
    }
}

/// Displayable turns in source order.
pub fn visible_turns(turns: &[ConversationTurn]) -> Vec<&ConversationTurn> {
    turns.iter().filter(|turn| turn.role.is_displayable()).collect()
}

/// Source index of the most recent user turn.
pub fn last_user_index(turns: &[ConversationTurn]) -> Option<usize> {
    turns.iter().rposition(ConversationTurn::is_user)
}
