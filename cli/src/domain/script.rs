//! Structured shell-script builder.
//!
//! Scripts run inside agent containers via `sh -c`. Every token is added as a
//! separate argument and quoted on render, so agent ids, package names and
//! branch names can never be interpreted by the shell.

use std::fmt::Write as _;

/// Quote a single token for POSIX `sh`.
///
/// Tokens made only of safe characters are returned unchanged; everything
/// else is wrapped in single quotes with embedded quotes closed and escaped.
#[must_use]
pub fn quote(token: &str) -> String {
    let safe = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@+,%".contains(c));
    if safe {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

/// An ordered list of shell commands that stops at the first failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellScript {
    lines: Vec<String>,
}

impl ShellScript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one command given as an argument vector.
    pub fn command<S: AsRef<str>>(&mut self, argv: &[S]) -> &mut Self {
        let line = argv
            .iter()
            .map(|a| quote(a.as_ref()))
            .collect::<Vec<_>>()
            .join(" ");
        self.lines.push(line);
        self
    }

    /// Append an `echo` of a literal message.
    pub fn echo(&mut self, message: &str) -> &mut Self {
        self.command(&["echo", message])
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from("set -e\n");
        for line in &self.lines {
            let _ = writeln!(out, "{line}");
        }
        out
    }

    /// `["/bin/sh", "-c", <rendered>]`, ready for an exec call.
    #[must_use]
    pub fn into_argv(self) -> Vec<String> {
        vec!["/bin/sh".to_string(), "-c".to_string(), self.render()]
    }
}
