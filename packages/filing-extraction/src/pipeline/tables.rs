//! Pattern-based table extraction from filing HTML.
//!
//! Finds the `<table>` whose text matches the most line-item patterns for
//! the requested statement and reads it into an `ExtractionResult`. This is
//! a lightweight regex scanner, not an HTML parser: it understands `<tr>`,
//! `<td>` and `<th>` and ignores everything else.

use regex::Regex;
use std::sync::LazyLock;

use super::numbers::{is_filler, normalize_cell, parse_number};
use crate::types::{key::StatementType, result::ExtractionResult};

static TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<table\b[^>]*>.*?</table\s*>").expect("valid regex"));
static ROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").expect("valid regex"));
static CELL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]\s*>").expect("valid regex")
});
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static SPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static INCOME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)(?:total\s+)?(?:net\s+)?revenues?\s*(?:and\s+sales)?",
        r"(?i)(?:total\s+)?(?:net\s+)?sales?",
        r"(?i)cost\s+of\s+(?:goods\s+sold|revenue|sales)",
        r"(?i)gross\s+(?:profit|margin|income)",
        r"(?i)operating\s+(?:income|profit|loss)",
        r"(?i)net\s+(?:income|profit|loss|earnings)",
        r"(?i)research\s+(?:and|&)\s+development",
        r"(?i)sales\s+(?:and|&)\s+marketing",
        r"(?i)general\s+(?:and|&)\s+administrative",
    ])
});

static BALANCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)(?:total\s+)?(?:current\s+)?assets",
        r"(?i)cash\s+(?:and\s+)?(?:cash\s+)?equivalents",
        r"(?i)(?:total\s+)?(?:current\s+)?liabilities",
        r"(?i)(?:total\s+)?(?:stockholders?|shareholders?)'?\s+equity",
        r"(?i)accounts\s+receivable",
        r"(?i)accounts\s+payable",
    ])
});

static CASH_FLOW_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)(?:net\s+)?cash\s+(?:provided\s+by|from)\s+operating\s+activities",
        r"(?i)(?:net\s+)?cash\s+(?:used\s+in|for)\s+investing\s+activities",
        r"(?i)(?:net\s+)?cash\s+(?:used\s+in|from)\s+financing\s+activities",
        r"(?i)net\s+(?:increase|decrease)\s+in\s+cash",
    ])
});

static RECONCILIATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)gaap\s+(?:net\s+)?(?:income|loss|earnings)",
        r"(?i)gaap\s+operating\s+(?:income|loss)",
        r"(?i)stock[\s-]based\s+compensation",
        r"(?i)share[\s-]based\s+compensation",
        r"(?i)amortization\s+of\s+intangible",
        r"(?i)acquisition[\s-]related",
        r"(?i)restructuring\s+(?:costs|charges)",
        r"(?i)non[\s-]gaap\s+(?:net\s+)?(?:income|loss|earnings)",
        r"(?i)non[\s-]gaap\s+operating\s+(?:income|loss)",
        r"(?i)adjusted\s+(?:net\s+)?(?:income|loss|earnings)",
    ])
});

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

/// Line-item patterns used to score tables for a statement.
///
/// Statements without their own set use the income statement patterns.
pub fn line_item_patterns(statement: &StatementType) -> &'static [Regex] {
    match statement {
        StatementType::BalanceSheet => BALANCE_PATTERNS.as_slice(),
        StatementType::CashFlow => CASH_FLOW_PATTERNS.as_slice(),
        StatementType::GaapReconciliation => RECONCILIATION_PATTERNS.as_slice(),
        StatementType::IncomeStatement | StatementType::Other(_) => INCOME_PATTERNS.as_slice(),
    }
}

/// Strip tags, decode common entities and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, " ");
    let decoded = decode_entities(&without_tags);
    SPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&#xa0;", " ")
        .replace("&#xA0;", " ")
        .replace("&mdash;", "—")
        .replace("&#8212;", "—")
        .replace("&#x2014;", "—")
        .replace("&ndash;", "–")
        .replace("&#8211;", "–")
        .replace("&#x2013;", "–")
        .replace("&rsquo;", "'")
        .replace("&#8217;", "'")
        .replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .replace('\u{a0}', " ")
}

/// A table reduced to rows of cell text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTable {
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    /// Parse one `<table>` block.
    pub fn parse(table_html: &str) -> Self {
        let rows = ROW_RE
            .captures_iter(table_html)
            .map(|row| {
                CELL_RE
                    .captures_iter(&row[1])
                    .map(|cell| html_to_text(&cell[1]))
                    .collect::<Vec<_>>()
            })
            .filter(|cells| !cells.is_empty())
            .collect();

        Self { rows }
    }

    /// Read the table as periods plus line items.
    ///
    /// Rows before the first labelled row carrying a number are header rows;
    /// the last of them with text beyond the label column supplies the
    /// periods. Year-only header rows have no label, so they stay headers.
    /// Every later row with a label and at least one value becomes a line
    /// item. Values are capped at the number of periods when periods exist.
    pub fn to_result(&self) -> ExtractionResult {
        let first_data_row = self
            .rows
            .iter()
            .position(|row| {
                let labelled = row.first().is_some_and(|label| !label.trim().is_empty());
                labelled && row.iter().skip(1).any(|c| parse_number(c).is_some())
            })
            .unwrap_or(self.rows.len());

        let periods: Vec<String> = self.rows[..first_data_row]
            .iter()
            .rev()
            .map(|row| {
                row.iter()
                    .skip(1)
                    .filter(|c| !is_filler(c))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .find(|cells| !cells.is_empty())
            .unwrap_or_default();

        let mut result = ExtractionResult::new().with_periods(periods.clone());

        for row in &self.rows[first_data_row..] {
            let Some((label, rest)) = row.split_first() else {
                continue;
            };
            let label = label.trim();
            if label.is_empty() {
                continue;
            }

            let mut values: Vec<_> = rest
                .iter()
                .filter(|c| !is_filler(c))
                .map(|c| normalize_cell(c))
                .collect();
            if !periods.is_empty() {
                values.truncate(periods.len());
            }

            if values.iter().any(Option::is_some) {
                result.data.insert(label.to_string(), values);
            }
        }

        result
    }
}

/// All `<table>` blocks in a document, in order.
pub fn find_tables(html: &str) -> Vec<&str> {
    TABLE_RE.find_iter(html).map(|m| m.as_str()).collect()
}

/// Count how many of `patterns` match somewhere in `text`.
pub fn pattern_score(text: &str, patterns: &[Regex]) -> usize {
    patterns.iter().filter(|p| p.is_match(text)).count()
}

/// Extract a statement by scoring every table against the statement's
/// line-item patterns and reading the best one.
///
/// Ties go to the earlier table. Returns an empty result if there are no
/// tables or none matches a pattern.
pub fn pattern_extract(html: &str, statement: &StatementType) -> ExtractionResult {
    let patterns = line_item_patterns(statement);

    let mut best: Option<(&str, usize)> = None;
    for table in find_tables(html) {
        let score = pattern_score(&html_to_text(table), patterns);
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((table, score));
        }
    }

    match best {
        Some((table, score)) => {
            tracing::debug!(statement = %statement, score, "Selected table by pattern score");
            ParsedTable::parse(table).to_result()
        }
        None => ExtractionResult::new(),
    }
}
