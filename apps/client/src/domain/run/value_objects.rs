use serde::{Deserialize, Serialize};
use std::fmt;

use crate::agents::Phase;

/// Lifecycle of a generation run
///
/// # Status Transitions
/// ```text
/// Idle -> Generating -> Complete
///            |    \---> Error
///            \--------> Idle        (start call or stream open failed)
/// Complete | Error -> Generating    (new start)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunLifecycle {
    /// No run has been started, or the last start attempt failed
    Idle,
    /// Remote pipeline is running and events are being applied
    Generating,
    /// Terminal success event received
    Complete,
    /// Terminal failure (remote error, lost stream or watchdog timeout)
    Error,
}

impl RunLifecycle {
    /// Checks if a transition from current lifecycle to `next` is valid
    ///
    /// `Generating -> Generating` is allowed because a new start
    /// supersedes an in-flight run.
    ///
    /// # Example
    /// ```
    /// use flowforge_client::domain::run::RunLifecycle;
    ///
    /// assert!(RunLifecycle::Idle.can_transition_to(RunLifecycle::Generating));
    /// assert!(!RunLifecycle::Idle.can_transition_to(RunLifecycle::Complete));
    /// ```
    pub fn can_transition_to(&self, next: RunLifecycle) -> bool {
        use RunLifecycle::*;
        matches!(
            (self, next),
            (Idle, Generating)
                | (Generating, Generating)
                | (Generating, Complete)
                | (Generating, Error)
                | (Generating, Idle)
                | (Complete, Generating)
                | (Error, Generating)
        )
    }

    /// True for `Complete` and `Error`
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunLifecycle::Complete | RunLifecycle::Error)
    }
}

impl fmt::Display for RunLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunLifecycle::Idle => write!(f, "idle"),
            RunLifecycle::Generating => write!(f, "generating"),
            RunLifecycle::Complete => write!(f, "complete"),
            RunLifecycle::Error => write!(f, "error"),
        }
    }
}

/// Per-agent status as reported by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Active,
    Complete,
    Error,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Active => write!(f, "active"),
            AgentStatus::Complete => write!(f, "complete"),
            AgentStatus::Error => write!(f, "error"),
        }
    }
}

/// Mutable per-agent progress within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentRuntimeState {
    pub status: AgentStatus,
    /// Always within 0..=100
    pub progress: u8,
}

impl Default for AgentRuntimeState {
    fn default() -> Self {
        Self {
            status: AgentStatus::Idle,
            progress: 0,
        }
    }
}

/// Phase the run is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CurrentPhase {
    /// Before any run has started
    Initializing,
    Phase(Phase),
}

impl CurrentPhase {
    pub fn phase(&self) -> Option<Phase> {
        match self {
            CurrentPhase::Initializing => None,
            CurrentPhase::Phase(phase) => Some(*phase),
        }
    }
}

impl fmt::Display for CurrentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentPhase::Initializing => write!(f, "initializing"),
            CurrentPhase::Phase(phase) => write!(f, "{}", phase),
        }
    }
}

/// Opaque server-issued run identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, used for archive names
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Description of the site to generate
///
/// # Invariants
/// - Never empty or whitespace-only
/// - Stored trimmed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    /// Creates a new Prompt, rejecting blank input
    ///
    /// # Example
    /// ```
    /// use flowforge_client::domain::run::Prompt;
    ///
    /// let prompt = Prompt::new("  A bakery landing page ").expect("valid prompt");
    /// assert_eq!(prompt.as_str(), "A bakery landing page");
    /// assert!(Prompt::new("   ").is_err());
    /// ```
    pub fn new(prompt: impl AsRef<str>) -> Result<Self, String> {
        let trimmed = prompt.as_ref().trim();
        if trimmed.is_empty() {
            return Err("Prompt cannot be empty".to_string());
        }
        Ok(Prompt(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Links to the artifacts a successful run produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalResult {
    pub github_repo: Option<String>,
    pub deployment_url: Option<String>,
}

/// Why a run ended in `Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The pipeline emitted `generation_error`
    Remote,
    /// The event stream was lost and could not be re-established
    Transport,
    /// No event arrived within the watchdog window
    Timeout,
}
