//! Application services — use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports` — never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod dependency;
pub mod filesystem;
pub mod image;
pub mod lifecycle;
pub mod monitor;
pub mod registry;
pub mod status;

pub use lifecycle::{AgentManager, ManagerOptions};
pub use monitor::ContainerMonitor;
pub use registry::{AgentRegistry, Reservation};
