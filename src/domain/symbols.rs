//! Symbol list parsing.
//!
//! Symbols come either from a comma-separated config value or CLI flag, or
//! from a symbols file with one symbol per line. Both are trimmed,
//! upper-cased and deduplicated in first-seen order.

use std::collections::HashSet;

/// Bars a symbol needs before the slow average produces its first value.
pub fn minimum_bars(slow_period: usize) -> usize {
    slow_period.max(1)
}

fn collect<'a>(tokens: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    tokens
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_uppercase)
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// `"aapl, MSFT,,aapl"` -> `["AAPL", "MSFT"]`. Empty tokens are skipped.
pub fn parse_symbol_list(input: &str) -> Vec<String> {
    collect(input.split(','))
}

/// One symbol per line. Blank lines and lines starting with `#` are skipped,
/// as is anything after a `#` on a line.
pub fn parse_symbols_file(content: &str) -> Vec<String> {
    collect(
        content
            .lines()
            .map(|line| line.split('#').next().unwrap_or_default()),
    )
}
