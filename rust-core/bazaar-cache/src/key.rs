// SPDX-License-Identifier: PMPL-1.0-or-later
//! Key normalization.
//!
//! Turns query parameters into canonical cache keys: any permutation of the
//! same id set, or of the same code set, yields the identical key. Search
//! keys are trimmed but otherwise kept verbatim, so `"Iron"` and `"iron"`
//! are distinct entries.
//!
//! Also builds the `ilike` patterns sent to the remote store for free-text
//! search.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of an item row.
pub type ItemId = i64;

/// Canonical serialization of a query's parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NormalizedKey(String);

impl NormalizedKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty key means "no valid input"; callers short-circuit on it.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A deduplicated set of positive item ids.
///
/// Remembers the caller's first-occurrence order (chunks are issued in that
/// order) while the key is built from the ascending ids, so equality and
/// hashing are set semantics.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    ids: Vec<ItemId>,
    key: NormalizedKey,
}

impl KeySet {
    /// Drop non-positive ids and duplicates.
    pub fn from_ids<I>(ids: I) -> Self
    where
        I: IntoIterator<Item = ItemId>,
    {
        let mut seen = HashSet::new();
        let ids: Vec<ItemId> = ids
            .into_iter()
            .filter(|id| *id > 0 && seen.insert(*id))
            .collect();

        let mut sorted = ids.clone();
        sorted.sort_unstable();
        let key = sorted
            .iter()
            .map(ItemId::to_string)
            .collect::<Vec<_>>()
            .join(",");

        Self {
            ids,
            key: NormalizedKey(key),
        }
    }

    /// Parse trimmed strings as ids; unparsable entries are dropped.
    pub fn from_strs<'a, I>(raw: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self::from_ids(raw.into_iter().filter_map(|s| s.trim().parse::<ItemId>().ok()))
    }

    pub fn key(&self) -> &NormalizedKey {
        &self.key
    }

    /// Ids in the caller's first-occurrence order.
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn sorted(&self) -> Vec<ItemId> {
        let mut sorted = self.ids.clone();
        sorted.sort_unstable();
        sorted
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Consecutive runs of at most `size` ids, in caller order.
    pub fn chunks(&self, size: usize) -> std::slice::Chunks<'_, ItemId> {
        self.ids.chunks(size.max(1))
    }
}

impl PartialEq for KeySet {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for KeySet {}

impl FromIterator<ItemId> for KeySet {
    fn from_iter<T: IntoIterator<Item = ItemId>>(iter: T) -> Self {
        Self::from_ids(iter)
    }
}

/// A deduplicated, sorted set of string codes (job abbreviations and the like).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeSet {
    codes: Vec<String>,
    key: NormalizedKey,
}

impl CodeSet {
    /// Trim, drop empty entries, dedupe and sort.
    pub fn new<'a, I>(raw: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut codes: Vec<String> = raw
            .into_iter()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect();
        codes.sort();
        codes.dedup();
        let key = NormalizedKey(codes.join(","));
        Self { codes, key }
    }

    pub fn key(&self) -> &NormalizedKey {
        &self.key
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Cache key for a code set.
pub fn codes_key<'a, I>(raw: I) -> NormalizedKey
where
    I: IntoIterator<Item = &'a str>,
{
    CodeSet::new(raw).key
}

/// Cache key for a search: `"{term}|{fuzzy|exact}|{limit or -}"`.
///
/// Only trimming is applied. A blank term yields an empty key.
pub fn search_key(term: &str, fuzzy: bool, limit: Option<usize>) -> NormalizedKey {
    let term = term.trim();
    if term.is_empty() {
        return NormalizedKey::default();
    }
    let mode = if fuzzy { "fuzzy" } else { "exact" };
    let limit = limit.map_or_else(|| "-".to_string(), |l| l.to_string());
    NormalizedKey(format!("{term}|{mode}|{limit}"))
}

fn push_escaped(out: &mut String, c: char) {
    if matches!(c, '%' | '_' | '\\') {
        out.push('\\');
    }
    out.push(c);
}

/// The `ilike` patterns for a search term, ANDed by the caller.
///
/// Exact: one `%term%` pattern. Fuzzy: one pattern per word with every
/// character wrapped in wildcards, so `abc` becomes `%a%b%c%`.
pub fn search_patterns(term: &str, fuzzy: bool) -> Vec<String> {
    let term = term.trim();
    if term.is_empty() {
        return Vec::new();
    }

    if !fuzzy {
        let mut pattern = String::with_capacity(term.len() + 2);
        pattern.push('%');
        term.chars().for_each(|c| push_escaped(&mut pattern, c));
        pattern.push('%');
        return vec![pattern];
    }

    term.split_whitespace()
        .map(|word| {
            let mut pattern = String::with_capacity(word.len() * 2 + 1);
            pattern.push('%');
            for c in word.chars() {
                push_escaped(&mut pattern, c);
                pattern.push('%');
            }
            pattern
        })
        .collect()
}
