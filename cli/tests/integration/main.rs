//! Integration tests for the git-capsulate CLI
//!
//! These tests spawn the actual binary against a temporary root. They only
//! exercise paths that do not reach the docker daemon.

mod cli_tests;
