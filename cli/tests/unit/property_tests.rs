//! Property-based tests for validation and shell quoting.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use proptest::prelude::*;

use capsulate_cli::domain::agent::{validate_agent_id, validate_branch_name, validate_package_name};
use capsulate_cli::domain::layout::{agent_id_from_name, container_name};
use capsulate_cli::domain::script::{ShellScript, quote};
use capsulate_cli::domain::{AgentConfig, validate_config};

// ============================================================================
// quote() property tests
// ============================================================================

/// Undo `quote` the way a POSIX shell would for the forms it produces.
fn shell_unquote(quoted: &str) -> String {
    let mut out = String::new();
    let mut in_quotes = false;
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '\'' => in_quotes = !in_quotes,
            '\\' if !in_quotes => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            other => out.push(other),
        }
    }
    out
}

proptest! {
    /// Quoting is reversible for any printable token.
    #[test]
    fn prop_quote_roundtrips(token in "[ -~]{0,40}") {
        prop_assert_eq!(shell_unquote(&quote(&token)), token);
    }

    /// Tokens outside the safe set are always single-quoted.
    #[test]
    fn prop_quote_wraps_unsafe_tokens(token in "[ -~]{1,40}") {
        let quoted = quote(&token);
        let safe = token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,%".contains(c));
        if safe {
            prop_assert_eq!(&quoted, &token);
        } else {
            prop_assert!(quoted.starts_with('\'') && quoted.ends_with('\''), "unquoted: {}", quoted);
        }
    }

    /// Every rendered script starts with `set -e` and has one line per command.
    #[test]
    fn prop_script_renders_one_line_per_command(args in prop::collection::vec("[a-z]{1,8}", 1..6)) {
        let mut script = ShellScript::new();
        for arg in &args {
            script.command(&["echo", arg.as_str()]);
        }
        let rendered = script.render();
        prop_assert!(rendered.starts_with("set -e\n"));
        prop_assert_eq!(rendered.lines().count(), args.len() + 1);
    }
}

// ============================================================================
// Identifier validation property tests
// ============================================================================

proptest! {
    /// Valid agent ids round-trip through the container name.
    #[test]
    fn prop_valid_agent_id_roundtrips_container_name(id in "[a-zA-Z0-9][a-zA-Z0-9_.-]{0,62}") {
        prop_assert!(validate_agent_id(&id).is_ok());
        let name = container_name(&id);
        prop_assert_eq!(agent_id_from_name(&name), Some(id.as_str()));
    }

    /// Ids containing a path separator are always rejected.
    #[test]
    fn prop_agent_id_with_slash_rejected(prefix in "[a-z]{0,5}", suffix in "[a-z]{0,5}") {
        let id = format!("{prefix}/{suffix}");
        prop_assert!(validate_agent_id(&id).is_err());
        prop_assert!(validate_config(&AgentConfig::new(id)).is_err());
    }

    /// Ids longer than 63 characters are rejected.
    #[test]
    fn prop_long_agent_id_rejected(id in "[a-z]{64,80}") {
        prop_assert!(validate_agent_id(&id).is_err());
    }

    /// Branch names with whitespace or `..` are rejected.
    #[test]
    fn prop_branch_with_space_or_dotdot_rejected(a in "[a-z]{1,6}", b in "[a-z]{1,6}", sep in prop::sample::select(vec![" ", "..", "~", ":"])) {
        let branch = format!("{a}{sep}{b}");
        prop_assert!(validate_branch_name(&branch).is_err());
    }

    /// Plain slash-separated branch names are accepted.
    #[test]
    fn prop_simple_branch_accepted(parts in prop::collection::vec("[a-z][a-z0-9-]{0,8}", 1..4)) {
        let branch = parts.join("/");
        prop_assert!(validate_branch_name(&branch).is_ok(), "{}", branch);
    }

    /// Package names never contain a path separator.
    #[test]
    fn prop_package_with_slash_rejected(a in "[a-z]{1,6}", b in "[a-z]{1,6}") {
        let name = format!("{a}/{b}");
        prop_assert!(validate_package_name(&name).is_err());
    }
}
