//! JSON output helpers.
//!
//! Every `--json` code path prints one pretty-printed document on stdout; a
//! failed command prints the error object below instead.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::AgentError;

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Stable error code for `err`: the `AgentError` code when one is in the
/// chain, `internal_error` otherwise.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.chain()
        .find_map(|e| e.downcast_ref::<AgentError>())
        .map_or("internal_error", AgentError::code)
}

/// Print `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{json}");
    Ok(())
}
