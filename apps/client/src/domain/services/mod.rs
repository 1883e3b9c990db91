// Ports to the remote pipeline and the preview collaborator
// Infrastructure provides the adapters

pub mod event_source;
pub mod generation_service;
pub mod preview;

pub use event_source::{EventConnection, EventSource};
pub use generation_service::{
    GenerationRequest, GenerationService, RemoteAgentStatus, RemoteRunStatus, RemoteStatus,
};
pub use preview::{LoggingPreviewSink, PreviewSink};
