mod collaborators;
mod orchestrator;

pub use collaborators::{Generation, Persistence, SessionView};
pub use orchestrator::{
    DeletionOutcome, RetryContext, RetryFailure, RetryOrchestrator, RetryReport, RetryState, SkipReason,
};
