//! Code pattern scanner
//!
//! Lexical, language-agnostic counting of code-shape markers in a file's raw
//! text. Each rule is matched independently, so one substring may count
//! toward several classes.

use crate::error::ScanError;
use crate::reader::FileReader;
use crate::types::PatternCounts;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// `(name, pattern)` pairs, in reporting order
const PATTERN_RULES: &[(&str, &str)] = &[
    ("functions", r"function\s+\w+\("),
    ("loops", r"\b(for|while)\s*\("),
    ("if_statements", r"\bif\s*\("),
    ("classes", r"\bclass\s+\w+"),
    ("console_logs", r"console\.log\("),
    ("comments", r"//|/\*"),
];

fn compiled_rules() -> &'static [(&'static str, Regex)] {
    static RULES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    RULES.get_or_init(|| {
        PATTERN_RULES
            .iter()
            .map(|(name, pattern)| {
                let regex = Regex::new(pattern).expect("built-in pattern rule is valid");
                (*name, regex)
            })
            .collect()
    })
}

/// Result of scanning one file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Match count per pattern class
    pub patterns: PatternCounts,
    /// Total number of lines in the text
    pub line_count: u64,
}

/// Count every pattern class and the lines of `text`
pub fn analyze(text: &str) -> ScanReport {
    let patterns = compiled_rules()
        .iter()
        .map(|(name, regex)| (name.to_string(), regex.find_iter(text).count() as u64))
        .collect();

    ScanReport {
        patterns,
        line_count: text.lines().count() as u64,
    }
}

/// Read `label` through `reader` and scan its content
pub(crate) fn scan_file(reader: &dyn FileReader, label: &str) -> Result<ScanReport, ScanError> {
    let text = reader.read_text(label).map_err(|source| ScanError::Read {
        label: label.to_string(),
        source,
    })?;
    Ok(analyze(&text))
}
