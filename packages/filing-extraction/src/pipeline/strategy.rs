//! Strategy selection from document structure.
//!
//! Documents are profiled by table count and numeric density; tabular
//! filings go through pattern extraction first, loosely structured ones
//! straight to the AI.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static NUMERIC_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+[,.]?\d*").expect("valid regex"));

/// Structural summary of a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContentProfile {
    /// Length in characters
    pub length: usize,

    /// Number of `<table` openings, case-insensitive
    pub table_count: usize,

    /// Numeric tokens per 1000 characters
    pub numeric_density: f64,
}

impl ContentProfile {
    /// Profile a document.
    pub fn analyze(html: &str) -> Self {
        let length = html.chars().count();
        let table_count = html.to_lowercase().matches("<table").count();
        let numeric_tokens = NUMERIC_TOKEN_RE.find_iter(html).count();
        let numeric_density = numeric_tokens as f64 / length.max(1) as f64 * 1000.0;

        Self {
            length,
            table_count,
            numeric_density,
        }
    }
}

/// How a document is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    /// Pattern extraction, enhanced by the AI with learned context.
    Hybrid,

    /// Pattern extraction, AI only when too few items are found.
    PatternFirst,

    /// AI extraction over truncated content.
    TargetedAi,
}

impl fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hybrid => "hybrid",
            Self::PatternFirst => "pattern_first",
            Self::TargetedAi => "targeted_ai",
        })
    }
}

/// Pick a strategy for a profiled document.
pub fn select_strategy(profile: &ContentProfile) -> ExtractionStrategy {
    if profile.table_count >= 3 && profile.numeric_density > 5.0 {
        ExtractionStrategy::Hybrid
    } else if profile.table_count >= 1 && profile.numeric_density > 2.0 {
        ExtractionStrategy::PatternFirst
    } else {
        ExtractionStrategy::TargetedAi
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(table_count: usize, numeric_density: f64) -> ContentProfile {
        ContentProfile {
            length: 1000,
            table_count,
            numeric_density,
        }
    }

    #[test]
    fn test_analyze_counts_tables_case_insensitively() {
        let p = ContentProfile::analyze("<TABLE></TABLE><table class=x></table>");
        assert_eq!(p.table_count, 2);
    }

    #[test]
    fn test_analyze_numeric_density() {
        // 100 chars, 2 numeric tokens -> 20 per 1000
        let html = format!("{}1,234 and 5.6", " ".repeat(87));
        assert_eq!(html.chars().count(), 100);
        let p = ContentProfile::analyze(&html);
        assert!((p.numeric_density - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_counts_characters_not_bytes() {
        // 100 chars but 287 bytes
        let html = format!("{}1,234 and 5.6", "€".repeat(87));
        let p = ContentProfile::analyze(&html);
        assert_eq!(p.length, 100);
        assert!((p.numeric_density - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_empty_document() {
        let p = ContentProfile::analyze("");
        assert_eq!(p.length, 0);
        assert_eq!(p.table_count, 0);
        assert_eq!(p.numeric_density, 0.0);
    }

    #[test]
    fn test_strategy_thresholds() {
        assert_eq!(select_strategy(&profile(3, 5.1)), ExtractionStrategy::Hybrid);
        assert_eq!(select_strategy(&profile(3, 5.0)), ExtractionStrategy::PatternFirst);
        assert_eq!(select_strategy(&profile(1, 2.1)), ExtractionStrategy::PatternFirst);
        assert_eq!(select_strategy(&profile(1, 2.0)), ExtractionStrategy::TargetedAi);
        assert_eq!(select_strategy(&profile(0, 50.0)), ExtractionStrategy::TargetedAi);
    }
}
