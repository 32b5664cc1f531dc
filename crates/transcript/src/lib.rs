pub mod classifier;
pub mod mock;
pub mod policy;
pub mod reasoning;
pub mod retry;
pub mod scroll;
pub mod transcript;

pub use classifier::{
    active_reasoning_indices, any_reasoning_active, has_tool_invocation, has_visible_text, is_reasoning_active,
    is_skeleton,
};
pub use mock::{InMemoryPersistence, InMemorySession, RecordingGeneration};
pub use policy::{TranscriptPolicy, TurnRenderPolicy, last_user_index, visible_turns};
pub use reasoning::{ReasoningSectionKey, ReasoningUiState, ReasoningVisibilityStore};
pub use retry::{
    DeletionOutcome, Generation, Persistence, RetryContext, RetryFailure, RetryOrchestrator, RetryReport, RetryState,
    SessionView, SkipReason,
};
pub use scroll::{ScrollAction, ScrollBehavior, ScrollCoordinator, ScrollDriver, ScrollEvent, ScrollTarget};
pub use transcript::{ReasoningToggle, StreamingTranscript};

pub use threadline_core::{Error, Result};
