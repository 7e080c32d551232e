//! Extraction result payload - periods plus line items.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single table cell after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numeric value, if the cell is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Structured data extracted from one financial statement.
///
/// `data` preserves the line-item order of the source table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Period column headers, most recent first as they appear
    #[serde(default)]
    pub periods: Vec<String>,

    /// Line item name -> one value per period
    #[serde(default)]
    pub data: IndexMap<String, Vec<Option<CellValue>>>,
}

impl ExtractionResult {
    /// Create an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the periods.
    pub fn with_periods(mut self, periods: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.periods = periods.into_iter().map(Into::into).collect();
        self
    }

    /// Add a line item of numeric values.
    pub fn with_line(mut self, label: impl Into<String>, values: &[f64]) -> Self {
        self.data.insert(
            label.into(),
            values.iter().map(|v| Some(CellValue::Number(*v))).collect(),
        );
        self
    }

    /// Whether no line items were extracted.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of line items.
    pub fn item_count(&self) -> usize {
        self.data.len()
    }

    /// Line item labels in source order.
    pub fn line_items(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Rename a line item in place, keeping its position.
    ///
    /// Returns false if `old` is not present. An existing `new` entry is
    /// replaced.
    pub fn rename_line(&mut self, old: &str, new: &str) -> bool {
        if old == new {
            return self.data.contains_key(old);
        }
        if !self.data.contains_key(old) {
            return false;
        }
        self.data.shift_remove(new);
        if let Some((index, _, values)) = self.data.shift_remove_full(old) {
            self.data.shift_insert(index, new.to_string(), values);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_periods_and_data() {
        let json = r#"{
            "periods": ["Q1 2024", "Q1 2023"],
            "data": {
                "Revenue": [1200.5, 1100],
                "Net income": [null, "n/m"]
            }
        }"#;

        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.periods.len(), 2);
        assert_eq!(result.item_count(), 2);
        assert_eq!(
            result.data["Revenue"][0],
            Some(CellValue::Number(1200.5))
        );
        assert_eq!(result.data["Net income"][0], None);
        assert_eq!(
            result.data["Net income"][1],
            Some(CellValue::Text("n/m".to_string()))
        );
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let result: ExtractionResult = serde_json::from_str("{}").unwrap();
        assert!(result.is_empty());
        assert!(result.periods.is_empty());
    }

    #[test]
    fn test_rename_line_keeps_position() {
        let mut result = ExtractionResult::new()
            .with_line("Rev", &[1.0])
            .with_line("COGS", &[2.0])
            .with_line("Net", &[3.0]);

        assert!(result.rename_line("COGS", "Cost of revenue"));
        let items: Vec<_> = result.line_items().collect();
        assert_eq!(items, vec!["Rev", "Cost of revenue", "Net"]);

        assert!(!result.rename_line("Missing", "X"));
    }

    #[test]
    fn test_rename_onto_existing_label_replaces_it() {
        let mut result = ExtractionResult::new()
            .with_line("Revenue", &[1.0])
            .with_line("Total revenue", &[9.0]);

        assert!(result.rename_line("Revenue", "Total revenue"));
        assert_eq!(result.item_count(), 1);
        assert_eq!(result.data["Total revenue"], vec![Some(CellValue::Number(1.0))]);
    }
}
