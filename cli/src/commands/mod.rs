//! Command implementations

pub mod branch;
pub mod create;
pub mod deps;
pub mod destroy;
pub mod exec;
pub mod list;
pub mod metrics;
pub mod monitor;
pub mod overlay;
pub mod status;

use clap::Args;

/// An agent id argument.
#[derive(Args)]
pub struct AgentArgs {
    /// Agent id
    pub agent_id: String,
}
