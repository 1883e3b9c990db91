use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the generation client
#[derive(Debug, Error)]
pub enum ClientError {
    /// Input rejected before anything was sent; no state was changed
    #[error("Validation error: {0}")]
    Validation(String),

    /// Start call or event stream failed before a terminal event
    #[error("Transport error: {0}")]
    Transport(String),

    /// The pipeline reported `generation_error`
    #[error("Generation failed: {0}")]
    RemoteReported(String),

    /// Archive fetch failed; run state is unaffected
    #[error("Download failed: {0}")]
    Download(String),

    #[error("No event received within {0:?}")]
    Timeout(Duration),

    #[error("No run has been started")]
    NoActiveRun,

    #[error("Run {0} was superseded by a newer run")]
    Superseded(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;
