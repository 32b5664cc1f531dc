use std::collections::{HashMap, HashSet};
use threadline_core::{ConversationTurn, TurnId};

/// Identifies one reasoning segment by its turn's identifier and part position.
///
/// Keys use the turn id rather than the turn's position so a retry that
/// truncates and regenerates the tail cannot reattach state to a different
/// segment. Turns without a durable id fall back to a positional id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReasoningSectionKey {
    pub turn_id: TurnId,
    pub part_index: usize,
}

impl ReasoningSectionKey {
    /// Key for part `part_index` of turn `turn_id`.
    pub fn new(turn_id: impl Into<TurnId>, part_index: usize) -> Self {
        Self { turn_id: turn_id.into(), part_index }
    }

    /// Key for part `part_index` of `turn`, which sits at `turn_index` in the sequence.
    pub fn for_turn(turn: &ConversationTurn, turn_index: usize, part_index: usize) -> Self {
        let turn_id = match turn.durable_id() {
            Some(id) => id.clone(),
            None => TurnId::new(format!("#{}", turn_index)),
        };
        Self { turn_id, part_index }
    }
}

/// Expand/fullscreen state of one reasoning segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReasoningUiState {
    pub expanded: bool,
    pub fullscreen: bool,
}

/// Expand/fullscreen state for every reasoning segment the user has touched.
///
/// Entries are created lazily on first toggle; reads of untouched segments
/// return the collapsed default. Nothing is evicted automatically, callers
/// evict turns they remove.
#[derive(Debug, Clone, Default)]
pub struct ReasoningVisibilityStore {
    sections: HashMap<ReasoningSectionKey, ReasoningUiState>,
}

impl ReasoningVisibilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state, or the collapsed default.
    pub fn get(&self, key: &ReasoningSectionKey) -> ReasoningUiState {
        self.sections.get(key).copied().unwrap_or_default()
    }

    /// Flip `expanded` and return the new state.
    pub fn toggle_expanded(&mut self, key: ReasoningSectionKey) -> ReasoningUiState {
        let state = self.sections.entry(key).or_default();
        state.expanded = !state.expanded;
        *state
    }

    /// Flip `fullscreen` and return the new state.
    pub fn toggle_fullscreen(&mut self, key: ReasoningSectionKey) -> ReasoningUiState {
        let state = self.sections.entry(key).or_default();
        state.fullscreen = !state.fullscreen;
        *state
    }

    /// Drop every entry belonging to `turn_id`. Returns the number removed.
    pub fn evict_turn(&mut self, turn_id: &TurnId) -> usize {
        let before = self.sections.len();
        self.sections.retain(|key, _| &key.turn_id != turn_id);
        before - self.sections.len()
    }

    /// Keep only entries whose turn is still in `turns`. Returns the number removed.
    pub fn retain_turns(&mut self, turns: &[ConversationTurn]) -> usize {
        let live: HashSet<TurnId> = turns
            .iter()
            .enumerate()
            .map(|(index, turn)| ReasoningSectionKey::for_turn(turn, index, 0).turn_id)
            .collect();
        let before = self.sections.len();
        self.sections.retain(|key, _| live.contains(&key.turn_id));
        before - self.sections.len()
    }

    /// Forget every section, e.g. when the view closes.
    pub fn clear(&mut self) {
        self.sections.clear();
    }

    /// Number of sections with stored state.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadline_core::Part;

    #[test]
    fn test_get_defaults_to_collapsed() {
        let store = ReasoningVisibilityStore::new();
        let state = store.get(&ReasoningSectionKey::new("a1", 0));
        assert_eq!(state, ReasoningUiState { expanded: false, fullscreen: false });
        assert!(store.is_empty());
    }

    #[test]
    fn test_toggle_expanded() {
        let mut store = ReasoningVisibilityStore::new();
        let key = ReasoningSectionKey::new("a1", 0);

        assert!(store.toggle_expanded(key.clone()).expanded);
        assert!(store.get(&key).expanded);
        assert!(!store.toggle_expanded(key.clone()).expanded);
        assert!(!store.get(&key).expanded);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_toggle_fullscreen_is_independent() {
        let mut store = ReasoningVisibilityStore::new();
        let key = ReasoningSectionKey::new("a1", 2);

        store.toggle_fullscreen(key.clone());
        assert_eq!(store.get(&key), ReasoningUiState { expanded: false, fullscreen: true });

        store.toggle_expanded(key.clone());
        assert_eq!(store.get(&key), ReasoningUiState { expanded: true, fullscreen: true });
    }

    #[test]
    fn test_keys_are_per_segment() {
        let mut store = ReasoningVisibilityStore::new();
        store.toggle_expanded(ReasoningSectionKey::new("a1", 0));

        assert!(!store.get(&ReasoningSectionKey::new("a1", 1)).expanded);
        assert!(!store.get(&ReasoningSectionKey::new("a2", 0)).expanded);
    }

    #[test]
    fn test_for_turn_uses_durable_id() {
        let turn = ConversationTurn::assistant("msg-9", vec![Part::reasoning("x")]);
        assert_eq!(ReasoningSectionKey::for_turn(&turn, 4, 0), ReasoningSectionKey::new("msg-9", 0));

        let local = ConversationTurn::assistant("", vec![Part::reasoning("x")]);
        assert_eq!(ReasoningSectionKey::for_turn(&local, 4, 0), ReasoningSectionKey::new("#4", 0));
    }

    #[test]
    fn test_evict_turn() {
        let mut store = ReasoningVisibilityStore::new();
        store.toggle_expanded(ReasoningSectionKey::new("a1", 0));
        store.toggle_expanded(ReasoningSectionKey::new("a1", 3));
        store.toggle_expanded(ReasoningSectionKey::new("a2", 0));

        assert_eq!(store.evict_turn(&TurnId::new("a1")), 2);
        assert_eq!(store.len(), 1);
        assert!(store.get(&ReasoningSectionKey::new("a2", 0)).expanded);
    }

    #[test]
    fn test_regenerated_turn_does_not_inherit_state() {
        let mut store = ReasoningVisibilityStore::new();
        let old = ConversationTurn::assistant("a-old", vec![Part::reasoning("x")]);
        store.toggle_expanded(ReasoningSectionKey::for_turn(&old, 1, 0));

        let regenerated = ConversationTurn::assistant("a-new", vec![Part::reasoning("y")]);
        assert!(!store.get(&ReasoningSectionKey::for_turn(&regenerated, 1, 0)).expanded);
    }

    #[test]
    fn test_retain_turns() {
        let mut store = ReasoningVisibilityStore::new();
        store.toggle_expanded(ReasoningSectionKey::new("a1", 0));
        store.toggle_expanded(ReasoningSectionKey::new("a2", 0));

        let turns = vec![ConversationTurn::user("u1", "hi"), ConversationTurn::assistant("a1", vec![])];
        assert_eq!(store.retain_turns(&turns), 1);
        assert!(store.get(&ReasoningSectionKey::new("a1", 0)).expanded);

        store.clear();
        assert!(store.is_empty());
    }
}
