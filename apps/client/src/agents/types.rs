use serde::{Deserialize, Serialize};

/// Pipeline phase an agent belongs to
///
/// Phases run strictly in declaration order; the same order is used
/// for the roster partition and for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Analysis,
    Design,
    Frontend,
    Backend,
    Testing,
    Deployment,
}

impl Phase {
    /// All phases in pipeline order
    pub const ALL: [Phase; 6] = [
        Phase::Analysis,
        Phase::Design,
        Phase::Frontend,
        Phase::Backend,
        Phase::Testing,
        Phase::Deployment,
    ];

    /// Position of this phase in pipeline order (0-based)
    pub fn index(self) -> usize {
        match self {
            Phase::Analysis => 0,
            Phase::Design => 1,
            Phase::Frontend => 2,
            Phase::Backend => 3,
            Phase::Testing => 4,
            Phase::Deployment => 5,
        }
    }

    /// The first phase of every run
    pub fn first() -> Phase {
        Phase::ALL[0]
    }

    /// Wire name used by the backend
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Analysis => "analysis",
            Phase::Design => "design",
            Phase::Frontend => "frontend",
            Phase::Backend => "backend",
            Phase::Testing => "testing",
            Phase::Deployment => "deployment",
        }
    }

    /// Parses a backend phase name, returning `None` for the
    /// non-agent stages the server reports (`initializing`, `deploying`, ...)
    pub fn from_name(name: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|phase| phase.as_str() == name)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable description of one pipeline worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AgentDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub phase: Phase,
    pub specialization: &'static str,
}
