//! Unit tests for git-capsulate
//!
//! These tests run the lifecycle manager against an in-memory container
//! runtime and temporary directories; no docker daemon is needed.

mod architecture;
mod dependency;
mod monitor;
mod property_tests;
