//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries
//! (domain → application → infra / commands / output) are maintained.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") || trimmed.contains("#[cfg(all(test") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Non-comment lines outside `#[cfg(test)]` blocks, with 1-based line numbers.
fn production_lines(path: &Path) -> Vec<(usize, String)> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            let comment = trimmed.starts_with("//") || trimmed.starts_with("/*") || trimmed.starts_with('*');
            (!in_test && !comment).then(|| (i + 1, line.to_string()))
        })
        .collect()
}

fn src_dir(parts: &[&str]) -> PathBuf {
    let mut dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    for part in parts {
        dir.push(part);
    }
    dir
}

fn rel(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Every production line under `dir` containing one of `forbidden`.
fn scan(dir: &Path, forbidden: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(dir) {
        for (lineno, line) in production_lines(&file) {
            for pattern in forbidden {
                if line.contains(pattern) {
                    violations.push(format!("{}:{lineno}: `{pattern}`: {}", rel(&file), line.trim()));
                }
            }
        }
    }
    violations
}

// ── Layer boundaries ─────────────────────────────────────────────────────────

#[test]
fn domain_is_pure() {
    let violations = scan(
        &src_dir(&["domain"]),
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_infra_or_presentation_imports() {
    let violations = scan(
        &src_dir(&["application"]),
        &["crate::infra", "crate::commands", "crate::output", "crate::app::"],
    );
    assert!(
        violations.is_empty(),
        "application/ must depend only on domain/ and its own ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_direct_io() {
    let violations = scan(
        &src_dir(&["application"]),
        &["std::fs", "std::process::Command", "tokio::process", "std::net::"],
    );
    assert!(
        violations.is_empty(),
        "application/ must reach the outside world through ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = scan(&src_dir(&["infra"]), &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = scan(&src_dir(&["infra"]), &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

// ── Process execution ────────────────────────────────────────────────────────

#[test]
fn no_tokio_command_runner_new_outside_infra() {
    let src = src_dir(&[]);
    let violations: Vec<String> = scan(&src, &["TokioCommandRunner::new"])
        .into_iter()
        .filter(|v| !v.replace('\\', "/").starts_with("src/infra/"))
        .collect();
    assert!(
        violations.is_empty(),
        "Found TokioCommandRunner::new outside infra/ — build runners in the docker adapter:\n{}",
        violations.join("\n")
    );
}

// ── Command handlers ─────────────────────────────────────────────────────────

#[test]
fn no_inline_json_branching_in_commands() {
    let mut violations = Vec::new();
    for file in collect_rs_files(&src_dir(&["commands"])) {
        for (lineno, line) in production_lines(&file) {
            let trimmed = line.trim();
            if line.contains("json: bool")
                || trimmed.starts_with("if json")
                || trimmed.starts_with("if !json")
            {
                violations.push(format!("{}:{lineno}: {trimmed}", rel(&file)));
            }
        }
    }
    assert!(
        violations.is_empty(),
        "Found inline JSON flags in commands/ — use app.is_json():\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_use_standardized_confirmation() {
    let violations = scan(
        &src_dir(&["commands"]),
        &["io::stdin().lock()", "Confirm::new()"],
    );
    assert!(
        violations.is_empty(),
        "Commands must use app.confirm() for user prompts:\n{}",
        violations.join("\n")
    );
}

#[test]
fn commands_do_not_build_infrastructure() {
    let violations = scan(
        &src_dir(&["commands"]),
        &["DockerCli::", "JsonAgentStore::new", "AgentManager::new"],
    );
    assert!(
        violations.is_empty(),
        "Commands must use the manager held by AppContext:\n{}",
        violations.join("\n")
    );
}
