//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! docker CLI adapter, host filesystem access, agent records, configuration
//! and metrics files.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod docker;
pub mod fs;
pub mod metrics;
pub mod state;
