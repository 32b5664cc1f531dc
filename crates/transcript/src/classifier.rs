//! Stateless predicates over a single turn's parts.

use threadline_core::{ConversationTurn, Part};

/// True if any text part carries a non-blank payload.
pub fn has_visible_text(turn: &ConversationTurn) -> bool {
    turn.parts.iter().any(|part| part.visible_text().is_some())
}

/// True if any part is a tool invocation.
pub fn has_tool_invocation(turn: &ConversationTurn) -> bool {
    turn.parts.iter().any(Part::is_tool_invocation)
}

/// True iff the part at `part_index` is reasoning and nothing after it in the
/// same turn is text or a tool invocation.
///
/// Data annotations and unrecognized parts do not close a reasoning segment.
pub fn is_reasoning_active(turn: &ConversationTurn, part_index: usize) -> bool {
    match turn.parts.get(part_index) {
        Some(part) if part.is_reasoning() => !turn.parts[part_index + 1..]
            .iter()
            .any(|later| later.is_text() || later.is_tool_invocation()),
        _ => false,
    }
}

/// Indices of the reasoning parts in `turn` that are still active.
pub fn active_reasoning_indices(turn: &ConversationTurn) -> Vec<usize> {
    (0..turn.parts.len())
        .filter(|&index| is_reasoning_active(turn, index))
        .collect()
}

/// True if any reasoning segment of any turn is still active.
pub fn any_reasoning_active(turns: &[ConversationTurn]) -> bool {
    turns
        .iter()
        .any(|turn| (0..turn.parts.len()).any(|index| is_reasoning_active(turn, index)))
}

/// True while an assistant turn has produced at most one part.
pub fn is_skeleton(turn: &ConversationTurn) -> bool {
    turn.is_assistant() && turn.parts.len() <= 1
}
