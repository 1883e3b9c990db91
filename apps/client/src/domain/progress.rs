use serde::Serialize;

use crate::agents::{AgentCatalog, Phase};
use crate::domain::run::{AgentStatus, RunState};

/// Completion of one phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseProgress {
    pub phase: Phase,
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

/// Views derived from a [`RunState`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressReport {
    /// One entry per phase, in pipeline order
    pub per_phase: Vec<PhaseProgress>,
    /// Index of the current phase, `None` before a run starts
    pub current_phase_index: Option<usize>,
    /// Server-reported overall progress when available, otherwise the
    /// share of completed agents across the whole roster
    pub overall_progress: u8,
}

impl ProgressReport {
    pub fn phase(&self, phase: Phase) -> &PhaseProgress {
        &self.per_phase[phase.index()]
    }
}

/// Stateless derivation of per-phase completion from run state
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseProgressAggregator {
    catalog: AgentCatalog,
}

impl PhaseProgressAggregator {
    pub fn new(catalog: AgentCatalog) -> Self {
        Self { catalog }
    }

    /// Derives the progress report for `state`
    ///
    /// `percentage = round(100 * completed / total)`, 0 when `total` is 0.
    pub fn derive(&self, state: &RunState) -> ProgressReport {
        let per_phase: Vec<PhaseProgress> = Phase::ALL
            .iter()
            .map(|phase| {
                let members = self.catalog.by_phase(*phase);
                let completed = members
                    .iter()
                    .filter(|agent| {
                        state
                            .agent(agent.id)
                            .is_some_and(|a| a.status == AgentStatus::Complete)
                    })
                    .count();
                let total = self.catalog.count(*phase);

                PhaseProgress {
                    phase: *phase,
                    completed,
                    total,
                    percentage: rounded_percentage(completed, total),
                }
            })
            .collect();

        let overall_progress = if state.is_progress_reported() {
            state.overall_progress()
        } else {
            let completed = per_phase.iter().map(|p| p.completed).sum();
            let total = per_phase.iter().map(|p| p.total).sum();
            rounded_percentage(completed, total)
        };

        ProgressReport {
            per_phase,
            current_phase_index: state.current_phase().phase().map(Phase::index),
            overall_progress,
        }
    }
}

/// `round(100 * part / whole)` with halves rounded up
fn rounded_percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((200 * part + whole) / (2 * whole)).min(100) as u8
}
