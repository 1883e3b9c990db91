// Agent roster
//
// Static description of the 88 pipeline workers and the six phases
// they are partitioned into.

pub mod catalog;
pub mod types;

pub use catalog::{AgentCatalog, AGENT_COUNT};
pub use types::{AgentDescriptor, Phase};
