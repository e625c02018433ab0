//! Ranking catalog entries against a free-text query.
//!
//! Each candidate name (the entry's normalized name and every normalized
//! alias) earns the best of the tiers below; the entry's score is the best
//! candidate, never a sum, so long alias lists cannot push an unrelated
//! entry up the list.

use crate::dataset::DatasetEntry;
use crate::text::{normalize, tokens};

pub const EXACT_WEIGHT: u32 = 120;
pub const WORD_EXACT_WEIGHT: u32 = 110;
pub const WORD_PREFIX_WEIGHT: u32 = 95;
pub const PREFIX_WEIGHT: u32 = 90;
pub const SUBSTRING_WEIGHT: u32 = 60;
pub const TOKEN_WEIGHT: u32 = 10;

pub const DEFAULT_SUGGESTION_LIMIT: usize = 10;

/// Score an entry against an already normalized query. Zero means no match.
#[must_use]
pub fn score(entry: &DatasetEntry, query_norm: &str) -> u32 {
    if query_norm.is_empty() {
        return 0;
    }
    std::iter::once(&entry.name_norm)
        .chain(entry.aliases_norm.iter())
        .map(|candidate| score_name(candidate, query_norm))
        .max()
        .unwrap_or(0)
}

fn score_name(candidate: &str, query: &str) -> u32 {
    if candidate.is_empty() {
        return 0;
    }

    let mut best = if candidate == query {
        EXACT_WEIGHT
    } else if candidate.starts_with(query) {
        PREFIX_WEIGHT
    } else if candidate.contains(query) {
        SUBSTRING_WEIGHT
    } else {
        let hits = tokens(query).filter(|t| candidate.contains(t)).count();
        // stays below the substring tier however long the query is
        (u32::try_from(hits).unwrap_or(u32::MAX))
            .saturating_mul(TOKEN_WEIGHT)
            .min(SUBSTRING_WEIGHT - 1)
    };

    // Users often type the second word of a dish ("mudde" for "ragi mudde").
    if tokens(candidate).any(|w| w == query) {
        best = best.max(WORD_EXACT_WEIGHT);
    } else if tokens(candidate).any(|w| w.starts_with(query)) {
        best = best.max(WORD_PREFIX_WEIGHT);
    }
    best
}

/// Entries with a positive score, best first. Equal scores keep catalog
/// order. At most `limit` entries.
#[must_use]
pub fn search_suggestions<'a>(
    entries: &'a [DatasetEntry],
    query: &str,
    limit: usize,
) -> Vec<&'a DatasetEntry> {
    let mut ranked = rank(entries, query);
    ranked.truncate(limit);
    ranked.into_iter().map(|(entry, _)| entry).collect()
}

/// The single best-scoring entry, if any scores above zero.
#[must_use]
pub fn lookup_best<'a>(entries: &'a [DatasetEntry], query: &str) -> Option<&'a DatasetEntry> {
    rank(entries, query).into_iter().next().map(|(entry, _)| entry)
}

fn rank<'a>(entries: &'a [DatasetEntry], query: &str) -> Vec<(&'a DatasetEntry, u32)> {
    let q = normalize(query);
    if q.is_empty() {
        return Vec::new();
    }
    let mut ranked: Vec<(&DatasetEntry, u32)> = entries
        .iter()
        .map(|e| (e, score(e, &q)))
        .filter(|(_, s)| *s > 0)
        .collect();
    // stable: ties keep insertion order
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}
