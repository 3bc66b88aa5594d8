//! Domain layer — pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod agent;
pub mod config;
pub mod container;
pub mod error;
pub mod git;
pub mod layout;
pub mod script;
pub mod stats;

pub use agent::{Agent, AgentConfig, validate_config};
pub use config::CapsulateConfig;
pub use container::{ContainerState, ContainerSummary};
pub use error::{AgentError, AgentResult, ConfigError, RegistryError};
pub use layout::{HostLayout, Mount};
pub use script::ShellScript;
pub use stats::StatsSample;
