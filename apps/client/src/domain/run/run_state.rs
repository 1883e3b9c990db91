use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::events::{clamp_percent, RunEvent};
use super::value_objects::{
    AgentRuntimeState, AgentStatus, CurrentPhase, FailureKind, RunId, RunLifecycle, TerminalResult,
};
use crate::agents::{AgentCatalog, Phase};
use crate::domain::services::{RemoteRunStatus, RemoteStatus};

/// Authoritative snapshot of one generation run
///
/// Holds one [`AgentRuntimeState`] per catalog entry plus the run-level
/// lifecycle, phase and progress. A new run replaces the whole value;
/// runs are never merged.
///
/// # Invariants
/// - `active_agents` equals the set of agents whose status is `Active`
///   after every mutation
/// - every agent progress and the overall progress stay within 0..=100
/// - lifecycle changes follow [`RunLifecycle::can_transition_to`]
///
/// # Example
/// ```
/// use flowforge_client::agents::AgentCatalog;
/// use flowforge_client::domain::run::{RunEvent, RunLifecycle, RunState};
///
/// let catalog = AgentCatalog::new();
/// let mut state = RunState::begin(&catalog);
/// assert_eq!(state.lifecycle(), RunLifecycle::Generating);
///
/// let event = RunEvent::decode(r#"{"type":"agent_update","id":"agent_001","status":"active"}"#)
///     .unwrap()
///     .unwrap();
/// state.apply(event).unwrap();
/// assert!(state.active_agents().contains("agent_001"));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    run_id: Option<RunId>,
    lifecycle: RunLifecycle,
    current_phase: CurrentPhase,
    overall_progress: u8,
    progress_reported: bool,
    agents: BTreeMap<String, AgentRuntimeState>,
    active_agents: BTreeSet<String>,
    terminal_result: Option<TerminalResult>,
    last_error: Option<String>,
    failure_kind: Option<FailureKind>,
    latest_preview: Option<Value>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl RunState {
    /// State before any run was started
    pub fn new(catalog: &AgentCatalog) -> Self {
        Self {
            run_id: None,
            lifecycle: RunLifecycle::Idle,
            current_phase: CurrentPhase::Initializing,
            overall_progress: 0,
            progress_reported: false,
            agents: catalog
                .list_all()
                .iter()
                .map(|agent| (agent.id.to_string(), AgentRuntimeState::default()))
                .collect(),
            active_agents: BTreeSet::new(),
            terminal_result: None,
            last_error: None,
            failure_kind: None,
            latest_preview: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Fresh state for a run that is being started
    ///
    /// All agents idle at 0%, no active agents, first phase, 0% overall.
    /// The run id is attached once the remote start call returns.
    pub fn begin(catalog: &AgentCatalog) -> Self {
        Self {
            lifecycle: RunLifecycle::Generating,
            current_phase: CurrentPhase::Phase(Phase::first()),
            started_at: Some(Utc::now()),
            ..Self::new(catalog)
        }
    }

    /// Binds the server-issued run id
    pub fn attach_run(&mut self, run_id: RunId) {
        self.run_id = Some(run_id);
    }

    /// Undoes a start whose remote call or stream open failed
    pub fn revert_to_idle(&mut self, reason: impl Into<String>) -> Result<(), String> {
        self.transition(RunLifecycle::Idle)?;
        self.current_phase = CurrentPhase::Initializing;
        self.last_error = Some(reason.into());
        self.started_at = None;
        Ok(())
    }

    /// Applies one inbound event
    ///
    /// # Returns
    /// * `Ok(())` - Event applied
    /// * `Err(String)` - Event arrived outside `Generating`, refers to an
    ///   unknown agent or would make an invalid lifecycle transition; state
    ///   is left untouched
    pub fn apply(&mut self, event: RunEvent) -> Result<(), String> {
        // terminal events are guarded by the transition table
        if !event.is_terminal() && self.lifecycle != RunLifecycle::Generating {
            return Err(format!(
                "Cannot apply {} to run in {} state",
                event.kind(),
                self.lifecycle
            ));
        }

        match event {
            RunEvent::AgentUpdate {
                agent_id,
                status,
                progress,
            } => self.set_agent(&agent_id, status, progress),
            RunEvent::PhaseUpdate { phase, progress } => {
                self.current_phase = CurrentPhase::Phase(phase);
                self.overall_progress = progress;
                self.progress_reported = true;
                Ok(())
            }
            RunEvent::PreviewReady { payload } => {
                self.latest_preview = Some(payload);
                Ok(())
            }
            RunEvent::GenerationComplete(result) => self.complete(result),
            RunEvent::GenerationError { error } => self.fail(FailureKind::Remote, error),
        }
    }

    /// Marks the run failed for a local reason (lost stream, watchdog)
    /// or a remote one
    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) -> Result<(), String> {
        self.transition(RunLifecycle::Error)?;
        self.settle_active_agents(AgentStatus::Error);
        self.last_error = Some(message.into());
        self.failure_kind = Some(kind);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Overwrites state from the server's stored record of the run
    ///
    /// Agent statuses go through the same path as `agent_update`, so the
    /// active set stays consistent. Stage names outside the six agent
    /// phases leave the current phase unchanged.
    pub fn resync(&mut self, status: &RemoteRunStatus) -> Result<(), String> {
        if self.lifecycle != RunLifecycle::Generating {
            return Err(format!("Cannot resync run in {} state", self.lifecycle));
        }

        for (agent_id, remote) in &status.agents {
            if let Err(e) = self.set_agent(agent_id, remote.status, Some(clamp_percent(remote.progress))) {
                tracing::debug!("Skipping agent during resync: {}", e);
            }
        }

        if let Some(phase) = Phase::from_name(&status.current_phase) {
            self.current_phase = CurrentPhase::Phase(phase);
        }
        self.overall_progress = clamp_percent(status.progress);
        self.progress_reported = true;

        match status.status {
            RemoteStatus::Ready | RemoteStatus::Deployed => self.complete(TerminalResult {
                github_repo: status.github_repo.clone(),
                deployment_url: status.deployment_url.clone(),
            }),
            RemoteStatus::Error => self.fail(
                FailureKind::Remote,
                status
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            ),
            RemoteStatus::Generating | RemoteStatus::Unknown => Ok(()),
        }
    }

    fn complete(&mut self, result: TerminalResult) -> Result<(), String> {
        self.transition(RunLifecycle::Complete)?;
        self.settle_active_agents(AgentStatus::Complete);
        self.overall_progress = 100;
        self.progress_reported = true;
        self.terminal_result = Some(result);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    fn set_agent(
        &mut self,
        agent_id: &str,
        status: AgentStatus,
        progress: Option<u8>,
    ) -> Result<(), String> {
        let entry = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| format!("Unknown agent: {}", agent_id))?;

        entry.progress = match status {
            AgentStatus::Complete => 100,
            // last value kept for diagnostics
            AgentStatus::Error => entry.progress,
            AgentStatus::Active if entry.status == AgentStatus::Active => {
                progress.unwrap_or(entry.progress)
            }
            AgentStatus::Active | AgentStatus::Idle => progress.unwrap_or(0),
        };
        entry.status = status;

        if status == AgentStatus::Active {
            self.active_agents.insert(agent_id.to_string());
        } else {
            self.active_agents.remove(agent_id);
        }

        Ok(())
    }

    fn settle_active_agents(&mut self, status: AgentStatus) {
        for agent_id in std::mem::take(&mut self.active_agents) {
            if let Some(entry) = self.agents.get_mut(&agent_id) {
                entry.status = status;
                if status == AgentStatus::Complete {
                    entry.progress = 100;
                }
            }
        }
    }

    fn transition(&mut self, next: RunLifecycle) -> Result<(), String> {
        if !self.lifecycle.can_transition_to(next) {
            return Err(format!(
                "Invalid lifecycle transition from {} to {}",
                self.lifecycle, next
            ));
        }
        self.lifecycle = next;
        Ok(())
    }

    // ===== Getters =====

    pub fn run_id(&self) -> Option<&RunId> {
        self.run_id.as_ref()
    }

    pub fn lifecycle(&self) -> RunLifecycle {
        self.lifecycle
    }

    pub fn current_phase(&self) -> CurrentPhase {
        self.current_phase
    }

    /// Last overall progress set by a phase update or terminal event
    pub fn overall_progress(&self) -> u8 {
        self.overall_progress
    }

    /// Whether the server has reported overall progress for this run
    pub fn is_progress_reported(&self) -> bool {
        self.progress_reported
    }

    pub fn agent(&self, agent_id: &str) -> Option<&AgentRuntimeState> {
        self.agents.get(agent_id)
    }

    /// Per-agent state in catalog order
    pub fn agents(&self) -> impl Iterator<Item = (&str, &AgentRuntimeState)> {
        self.agents.iter().map(|(id, state)| (id.as_str(), state))
    }

    /// Ids of the agents currently active, in catalog order
    pub fn active_agents(&self) -> &BTreeSet<String> {
        &self.active_agents
    }

    pub fn terminal_result(&self) -> Option<&TerminalResult> {
        self.terminal_result.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        self.failure_kind
    }

    /// Most recent preview payload, if any
    pub fn latest_preview(&self) -> Option<&Value> {
        self.latest_preview.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Checks the active-set invariant
    pub fn is_active_set_consistent(&self) -> bool {
        let derived: BTreeSet<&str> = self
            .agents
            .iter()
            .filter(|(_, state)| state.status == AgentStatus::Active)
            .map(|(id, _)| id.as_str())
            .collect();
        derived.len() == self.active_agents.len()
            && self.active_agents.iter().all(|id| derived.contains(id.as_str()))
    }
}
