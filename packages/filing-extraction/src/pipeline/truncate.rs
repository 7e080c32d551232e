//! Budgeted truncation that keeps the parts of a filing worth sending.

use regex::Regex;
use std::sync::LazyLock;

/// Sections pulled forward before plain truncation, in priority order.
static PRIORITY_SECTIONS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?is)<table[^>]*>.*?</table>",
        r"(?is)consolidated.*?statement",
        r"(?is)income.*?statement",
        r"(?is)balance.*?sheet",
        r"(?is)cash.*?flow",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Truncate `html` to at most `max_chars` characters.
///
/// Content within the budget is returned unchanged. Otherwise table blocks
/// and statement headings shorter than half the budget are kept first,
/// joined by newlines, and the remaining budget is filled from the start of
/// what is left. Counts characters, never splits one.
pub fn smart_truncate(html: &str, max_chars: usize) -> String {
    if html.chars().count() <= max_chars {
        return html.to_string();
    }

    let section_limit = max_chars / 2;
    let mut preserved: Vec<String> = Vec::new();
    let mut used = 0;
    let mut remaining = html.to_string();

    for pattern in PRIORITY_SECTIONS.iter() {
        let sections: Vec<String> = pattern
            .find_iter(&remaining)
            .map(|m| m.as_str().to_string())
            .collect();

        for section in sections {
            let len = section.chars().count();
            let cost = if preserved.is_empty() { len } else { len + 1 };
            if len >= section_limit || used + cost > max_chars {
                continue;
            }
            remaining = remaining.replacen(&section, "", 1);
            preserved.push(section);
            used += cost;
        }
    }

    let mut out = preserved.join("\n");
    let separator = usize::from(!out.is_empty());
    let budget = max_chars.saturating_sub(used + separator);
    if budget > 0 {
        if separator == 1 {
            out.push('\n');
        }
        out.extend(remaining.chars().take(budget));
    }

    tracing::debug!(
        input_chars = html.chars().count(),
        kept_sections = preserved.len(),
        truncated_chars = out.chars().count(),
        "Truncated content"
    );

    out
}
