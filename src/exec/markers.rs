// src/exec/markers.rs

//! Classification of captured tool output.
//!
//! The external toolchain only communicates failure through its log text, so
//! we scan captured stdout/stderr for the markers it uses. The markers match
//! the tool's own vocabulary; lines are reported verbatim so the caller sees
//! the tool's message, not a paraphrase.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Lines starting with one of these prefixes are domain errors.
fn error_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(ERROR:|FATAL:|CRITICAL WARNING:)").expect("valid marker regex")
    })
}

/// Extract domain-error lines from captured output.
pub fn scan_output(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| error_marker().is_match(line))
        .map(|line| line.trim().to_string())
        .collect()
}

/// Synthetic error reported when a process left no output artifacts at all
/// (e.g. it crashed before writing a log). Never silently "no errors".
pub fn missing_output_error(dir: &Path) -> String {
    format!("no output artifacts found in {:?}; process produced no log", dir)
}
