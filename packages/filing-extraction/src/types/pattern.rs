//! Learned per-company extraction patterns.
//!
//! Each successful extraction teaches the store which line items and
//! period headers a company tends to use. The lists are bounded and keep
//! the most recently seen values.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::key::StatementType;
use super::result::ExtractionResult;

/// Default number of line items remembered per statement.
pub const DEFAULT_MAX_LINE_ITEMS: usize = 10;

/// Default number of period formats remembered per statement.
pub const DEFAULT_MAX_PERIOD_FORMATS: usize = 5;

/// Structural hints learned from prior extractions of one statement type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    /// Line item labels seen in earlier extractions, oldest first
    #[serde(default)]
    pub common_line_items: Vec<String>,

    /// Period headers seen in earlier extractions, oldest first
    #[serde(default)]
    pub period_formats: Vec<String>,

    /// Number of extractions that contributed to this pattern
    #[serde(default)]
    pub extraction_count: u64,

    /// Last time the pattern was updated
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Default for LearnedPattern {
    fn default() -> Self {
        Self {
            common_line_items: Vec::new(),
            period_formats: Vec::new(),
            extraction_count: 0,
            updated_at: Utc::now(),
        }
    }
}

impl LearnedPattern {
    /// Create an empty pattern.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge an extraction result into the pattern.
    ///
    /// New labels are appended; labels already known keep their place.
    /// Lists are then trimmed from the front to their limits.
    pub fn absorb(&mut self, result: &ExtractionResult, max_line_items: usize, max_periods: usize) {
        for item in result.line_items() {
            if !self.common_line_items.iter().any(|known| known == item) {
                self.common_line_items.push(item.to_string());
            }
        }

        for period in &result.periods {
            if !self.period_formats.contains(period) {
                self.period_formats.push(period.clone());
            }
        }

        self.extraction_count += 1;
        self.updated_at = Utc::now();

        keep_last(&mut self.common_line_items, max_line_items);
        keep_last(&mut self.period_formats, max_periods);
    }

    /// Render a context block describing the pattern.
    ///
    /// Lists at most five line items and three period formats.
    pub fn context(&self, entity: &str) -> String {
        let mut context = format!("\nLEARNED PATTERNS FOR {entity}:\n");

        if !self.common_line_items.is_empty() {
            let items: Vec<&str> = self
                .common_line_items
                .iter()
                .take(5)
                .map(String::as_str)
                .collect();
            context.push_str(&format!("Common line items: {}\n", items.join(", ")));
        }

        if !self.period_formats.is_empty() {
            let periods: Vec<&str> = self
                .period_formats
                .iter()
                .take(3)
                .map(String::as_str)
                .collect();
            context.push_str(&format!("Period formats: {}\n", periods.join(", ")));
        }

        context.push_str(&format!("Previous extractions: {}\n", self.extraction_count));
        context
    }
}

fn keep_last(list: &mut Vec<String>, max: usize) {
    if list.len() > max {
        let excess = list.len() - max;
        list.drain(..excess);
    }
}

/// All learned patterns for one entity, keyed by statement type.
pub type EntityPatterns = IndexMap<StatementType, LearnedPattern>;
