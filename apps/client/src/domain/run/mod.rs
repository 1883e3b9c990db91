// Run domain module
// Contains the run state aggregate, value objects, and inbound events

pub mod events;
pub mod run_state;
pub mod value_objects;

pub use events::RunEvent;
pub use run_state::RunState;
pub use value_objects::{
    AgentRuntimeState, AgentStatus, CurrentPhase, FailureKind, Prompt, RunId, RunLifecycle,
    TerminalResult,
};
