//! Comparable keys for free-text food names.

/// Lowercase, replace anything outside `[a-z0-9]` and whitespace with a
/// space, collapse whitespace runs and trim.
///
/// Non-ASCII letters are treated as separators, so `"Crème brûlée"` becomes
/// `"cr me br l e"`. Catalog rows and queries go through the same function,
/// which keeps them comparable.
#[must_use]
pub fn normalize(s: &str) -> String {
    let lowered = s.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with(' ') {
            out.push(' ');
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Space-separated tokens of an already normalized string.
pub fn tokens(normalized: &str) -> impl Iterator<Item = &str> {
    normalized.split(' ').filter(|t| !t.is_empty())
}

/// Storage key for a food master record: lowercased, trimmed, inner
/// whitespace collapsed. Punctuation is kept.
#[must_use]
pub fn canonical_name(s: &str) -> String {
    s.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
