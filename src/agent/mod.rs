//! Client side: conversation state and the orchestrator that drives it.

pub mod conversation;
pub mod orchestrator;

pub use conversation::Conversation;
pub use orchestrator::{Orchestrator, OrchestratorOptions, QueryOutcome};
