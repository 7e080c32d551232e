//! Cell value normalization for financial tables.
//!
//! Filings write numbers as `$1,234`, `(56)` for negatives, and dashes for
//! nil values. Parentheses are often split across cells (`(1,234` then `)`),
//! so a lone opening parenthesis is enough to mark a value negative.

use crate::types::result::CellValue;

const NIL_MARKERS: &[&str] = &["-", "--", "—", "–", "―", "n/a", "N/A", "nm", "NM"];

/// Normalize one cell's text.
///
/// Returns None for blank cells and nil markers; a number when the text
/// parses after stripping currency symbols, separators and parentheses;
/// otherwise the trimmed text.
pub fn normalize_cell(text: &str) -> Option<CellValue> {
    let trimmed = text.trim();
    if trimmed.is_empty() || NIL_MARKERS.contains(&trimmed) {
        return None;
    }

    match parse_number(trimmed) {
        Some(n) => Some(CellValue::Number(n)),
        None => Some(CellValue::Text(trimmed.to_string())),
    }
}

/// Parse a financial number, or None if the text is not numeric.
pub fn parse_number(text: &str) -> Option<f64> {
    let negative = text.contains('(') || text.trim_start().starts_with('-') || text.contains('−');

    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',' | '(' | ')' | '%' | '-' | '−'))
        .filter(|c| !c.is_whitespace())
        .collect();

    if digits.is_empty() || !digits.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let value: f64 = digits.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value.abs() } else { value })
}

/// Whether a cell holds nothing but layout filler (currency marks,
/// closing parentheses, percent signs).
///
/// Filings split `$`, `)` and `%` into their own cells; these are skipped
/// rather than treated as missing values.
pub fn is_filler(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_whitespace() || matches!(c, '$' | '€' | '£' | '¥' | ')' | '%'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_and_formatted_numbers() {
        assert_eq!(parse_number("1234"), Some(1234.0));
        assert_eq!(parse_number("$1,234.50"), Some(1234.5));
        assert_eq!(parse_number(" 12.5 % "), Some(12.5));
    }

    #[test]
    fn test_parentheses_are_negative() {
        assert_eq!(parse_number("(1,234)"), Some(-1234.0));
        assert_eq!(parse_number("(56"), Some(-56.0));
        assert_eq!(parse_number("$ (0.12)"), Some(-0.12));
        assert_eq!(parse_number("-7"), Some(-7.0));
    }

    #[test]
    fn test_non_numeric() {
        assert_eq!(parse_number("Revenue"), None);
        assert_eq!(parse_number("$"), None);
        assert_eq!(parse_number("12 months"), None);
    }

    #[test]
    fn test_normalize_cell() {
        assert_eq!(normalize_cell("  "), None);
        assert_eq!(normalize_cell("—"), None);
        assert_eq!(normalize_cell("(3)"), Some(CellValue::Number(-3.0)));
        assert_eq!(
            normalize_cell(" n/m "),
            Some(CellValue::Text("n/m".to_string()))
        );
    }

    #[test]
    fn test_filler_cells() {
        assert!(is_filler("$"));
        assert!(is_filler(" ) "));
        assert!(is_filler(""));
        assert!(!is_filler("(12"));
        assert!(!is_filler("—"));
    }
}
