//! Which shell commands are worth recording.
//!
//! A command is recorded verbatim or not at all. The sensitive scan is a
//! plain substring match over the whole lowercase text, so it errs towards
//! dropping harmless commands (`cargo build --features auth`) rather than
//! keeping one that carries a secret.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Navigation and inspection commands with no side effects worth tracking.
static TRIVIAL_COMMANDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "cd", "ls", "pwd", "clear", "exit", "history", "echo", "cat", "less", "more", "man",
        "help",
    ]
    .into_iter()
    .collect()
});

const SENSITIVE_PATTERNS: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "token",
    "api_key",
    "apikey",
    "auth",
    "credential",
    "private_key",
];

/// Returns `true` if `command` may be persisted.
pub fn should_record(command: &str) -> bool {
    let Some(first) = command.split_whitespace().next() else {
        return false;
    };
    let base = first.to_lowercase();

    if TRIVIAL_COMMANDS.contains(base.as_str()) {
        return false;
    }

    let lowered = command.to_lowercase();
    if contains_sensitive(&lowered) {
        return false;
    }

    // Intentionally redundant with the scan above for `export`/`set` assignments.
    if is_assignment(&base, command) && contains_sensitive(&lowered) {
        return false;
    }

    true
}

fn contains_sensitive(lowered: &str) -> bool {
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}

fn is_assignment(base: &str, command: &str) -> bool {
    matches!(base, "export" | "set") && command.contains('=')
}
