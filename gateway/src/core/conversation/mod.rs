//! Conversation orchestration.
//!
//! An [`Orchestrator`] owns one session's history and drives a single turn
//! at a time. It runs inside a dedicated task spawned by [`spawn_session`];
//! transports talk to it only through the cloneable [`OrchestratorHandle`].

mod message;
mod orchestrator;
mod task;

pub use message::{Message, Role};
pub use orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorResult, StreamMode, TurnOutput, TurnState,
};
pub use task::{OrchestratorHandle, PendingReply, SessionEvent, spawn_session};
