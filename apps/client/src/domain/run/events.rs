use serde::de::Error as _;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::value_objects::{AgentStatus, TerminalResult};
use crate::agents::Phase;

/// Progress event pushed by the pipeline over the run's event stream
///
/// Events are self-describing JSON envelopes with a `type`
/// discriminator. They are applied to [`super::RunState`] strictly in
/// arrival order.
///
/// # Example
/// ```
/// use flowforge_client::domain::run::{AgentStatus, RunEvent};
///
/// let event = RunEvent::decode(
///     r#"{"type":"agent_update","agent":{"id":"agent_001"},"status":"active"}"#,
/// )
/// .expect("well-formed")
/// .expect("known type");
///
/// assert_eq!(
///     event,
///     RunEvent::AgentUpdate {
///         agent_id: "agent_001".to_string(),
///         status: AgentStatus::Active,
///         progress: None,
///     }
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    /// An agent changed status
    AgentUpdate {
        agent_id: String,
        status: AgentStatus,
        /// Clamped to 0..=100 when present
        progress: Option<u8>,
    },
    /// The pipeline entered a phase; `progress` overrides the derived
    /// overall progress
    PhaseUpdate { phase: Phase, progress: u8 },
    /// A live preview is available; the payload is opaque to the client
    PreviewReady { payload: Value },
    /// Terminal success
    GenerationComplete(TerminalResult),
    /// Terminal failure reported by the pipeline
    GenerationError { error: String },
}

impl RunEvent {
    /// Decodes one text frame
    ///
    /// # Returns
    /// * `Ok(Some(event))` - A recognized event
    /// * `Ok(None)` - Well-formed envelope with an unknown `type`
    /// * `Err(_)` - Not JSON, no `type`, or a known type with bad fields
    pub fn decode(text: &str) -> Result<Option<RunEvent>, serde_json::Error> {
        let wire: WireEvent = serde_json::from_str(text)?;
        wire.into_event()
    }

    /// True for `generation_complete` and `generation_error`
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunEvent::GenerationComplete(_) | RunEvent::GenerationError { .. }
        )
    }

    /// Wire name of the event kind, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::AgentUpdate { .. } => "agent_update",
            RunEvent::PhaseUpdate { .. } => "phase_update",
            RunEvent::PreviewReady { .. } => "preview_ready",
            RunEvent::GenerationComplete(_) => "generation_complete",
            RunEvent::GenerationError { .. } => "generation_error",
        }
    }
}

/// Clamps a wire percentage into 0..=100
pub(crate) fn clamp_percent(value: i64) -> u8 {
    value.clamp(0, 100) as u8
}

#[derive(Debug, Deserialize)]
struct WireAgent {
    id: String,
    #[serde(default)]
    progress: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    AgentUpdate {
        #[serde(default)]
        agent: Option<WireAgent>,
        #[serde(default)]
        agent_id: Option<String>,
        #[serde(default)]
        id: Option<String>,
        status: AgentStatus,
        #[serde(default)]
        progress: Option<i64>,
    },
    PhaseUpdate {
        phase: Phase,
        #[serde(default)]
        progress: Option<i64>,
    },
    PreviewReady(Map<String, Value>),
    GenerationComplete {
        #[serde(default)]
        github_repo: Option<String>,
        #[serde(default)]
        deployment_url: Option<String>,
    },
    GenerationError {
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl WireEvent {
    fn into_event(self) -> Result<Option<RunEvent>, serde_json::Error> {
        let event = match self {
            WireEvent::AgentUpdate {
                agent,
                agent_id,
                id,
                status,
                progress,
            } => {
                let (nested_id, nested_progress) = match agent {
                    Some(agent) => (Some(agent.id), agent.progress),
                    None => (None, None),
                };
                let agent_id = nested_id
                    .or(agent_id)
                    .or(id)
                    .ok_or_else(|| serde_json::Error::custom("agent_update without an agent id"))?;

                RunEvent::AgentUpdate {
                    agent_id,
                    status,
                    progress: nested_progress.or(progress).map(clamp_percent),
                }
            }
            WireEvent::PhaseUpdate { phase, progress } => RunEvent::PhaseUpdate {
                phase,
                progress: clamp_percent(progress.unwrap_or(0)),
            },
            WireEvent::PreviewReady(payload) => RunEvent::PreviewReady {
                payload: Value::Object(payload),
            },
            WireEvent::GenerationComplete {
                github_repo,
                deployment_url,
            } => RunEvent::GenerationComplete(TerminalResult {
                github_repo,
                deployment_url,
            }),
            WireEvent::GenerationError { error } => RunEvent::GenerationError {
                error: error.unwrap_or_else(|| "unknown error".to_string()),
            },
            WireEvent::Unknown => return Ok(None),
        };

        Ok(Some(event))
    }
}
