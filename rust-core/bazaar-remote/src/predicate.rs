// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Query model shared by every remote store.
//
// A `QueryRequest` names a collection, an optional projection, a list of
// predicates that must all hold, and optional limit/range bounds. The four
// predicate shapes mirror what the hosted store supports: equality,
// membership in a bounded value list, case-insensitive pattern match, and
// array containment.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single row returned by the remote store: a JSON object keyed by column.
pub type Row = Map<String, Value>;

/// A filter applied to one column of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// `column = value`
    Eq { column: String, value: Value },
    /// `column IN (values...)`, bounded by the store's predicate ceiling.
    In { column: String, values: Vec<Value> },
    /// `column ILIKE pattern`, where `%` matches any run, `_` any single
    /// character, and `\` escapes the next character.
    ILike { column: String, pattern: String },
    /// Array column contains `value`.
    Contains { column: String, value: Value },
}

impl Predicate {
    /// Build an equality predicate.
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            column: column.to_string(),
            value: value.into(),
        }
    }

    /// Build a membership predicate from any iterator of values.
    pub fn in_list<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Predicate::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Build a case-insensitive pattern predicate.
    pub fn ilike(column: &str, pattern: &str) -> Self {
        Predicate::ILike {
            column: column.to_string(),
            pattern: pattern.to_string(),
        }
    }

    /// Build an array-containment predicate.
    pub fn contains(column: &str, value: impl Into<Value>) -> Self {
        Predicate::Contains {
            column: column.to_string(),
            value: value.into(),
        }
    }

    /// The column this predicate filters on.
    pub fn column(&self) -> &str {
        match self {
            Predicate::Eq { column, .. }
            | Predicate::In { column, .. }
            | Predicate::ILike { column, .. }
            | Predicate::Contains { column, .. } => column,
        }
    }

    /// Evaluate this predicate against a row. Missing columns never match.
    pub fn matches(&self, row: &Row) -> bool {
        let Some(cell) = row.get(self.column()) else {
            return false;
        };
        match self {
            Predicate::Eq { value, .. } => values_equal(cell, value),
            Predicate::In { values, .. } => values.iter().any(|v| values_equal(cell, v)),
            Predicate::ILike { pattern, .. } => match cell {
                Value::String(text) => ilike_matches(pattern, text),
                Value::Number(n) => ilike_matches(pattern, &n.to_string()),
                _ => false,
            },
            Predicate::Contains { value, .. } => match cell {
                Value::Array(items) => items.iter().any(|item| values_equal(item, value)),
                _ => false,
            },
        }
    }
}

/// Inclusive row window for paginated reads (`from..=to`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRange {
    /// First row offset (zero-based).
    pub from: usize,
    /// Last row offset, inclusive.
    pub to: usize,
}

impl RowRange {
    /// Number of rows covered by this window.
    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from) + 1
    }

    /// A range always covers at least one row.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// A predicate query against one remote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Collection (table or view) name.
    pub collection: String,
    /// Columns to return; empty means all columns.
    pub columns: Vec<String>,
    /// Predicates, combined with logical AND.
    pub filters: Vec<Predicate>,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Optional row window for paginated reads.
    pub range: Option<RowRange>,
}

impl QueryRequest {
    /// Start a request against `collection` with no filters.
    pub fn new(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            limit: None,
            range: None,
        }
    }

    /// Restrict the returned columns.
    pub fn with_columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Add a predicate (ANDed with the existing ones).
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    /// Cap the number of returned rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Read only the inclusive row window `from..=to`.
    pub fn with_range(mut self, from: usize, to: usize) -> Self {
        self.range = Some(RowRange { from, to });
        self
    }

    /// Size of the largest `in` list carried by this request.
    pub fn largest_in_list(&self) -> usize {
        self.filters
            .iter()
            .filter_map(|p| match p {
                Predicate::In { values, .. } => Some(values.len()),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Evaluate all filters against a row.
    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|p| p.matches(row))
    }

    /// Apply the column projection to a row.
    pub fn project(&self, row: &Row) -> Row {
        if self.columns.is_empty() {
            return row.clone();
        }
        self.columns
            .iter()
            .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
            .collect()
    }
}

/// Compare two JSON scalars the way the store compares column values:
/// numbers by numeric value, everything else structurally.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim() == n.to_string()
        }
        _ => a == b,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternToken {
    AnyRun,
    AnyOne,
    Literal(char),
}

fn tokenize(pattern: &str) -> Vec<PatternToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '%' => {
                if tokens.last() != Some(&PatternToken::AnyRun) {
                    tokens.push(PatternToken::AnyRun);
                }
            }
            '_' => tokens.push(PatternToken::AnyOne),
            '\\' => tokens.push(PatternToken::Literal(chars.next().unwrap_or('\\'))),
            other => tokens.push(PatternToken::Literal(other)),
        }
    }
    tokens
}

fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

/// Case-insensitive SQL `ILIKE` matching.
///
/// `%` matches any run of characters (including none), `_` matches exactly
/// one character, and `\` makes the following character literal.
pub fn ilike_matches(pattern: &str, text: &str) -> bool {
    let tokens = tokenize(pattern);
    let text: Vec<char> = text.chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    // Position after the most recent `%` and the text index it is anchored at.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(PatternToken::AnyRun) => {
                p += 1;
                backtrack = Some((p, t));
                continue;
            }
            Some(PatternToken::AnyOne) => {
                p += 1;
                t += 1;
                continue;
            }
            Some(PatternToken::Literal(c)) if chars_eq_ignore_case(*c, text[t]) => {
                p += 1;
                t += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((after_run, anchor)) => {
                p = after_run;
                t = anchor + 1;
                backtrack = Some((after_run, anchor + 1));
            }
            None => return false,
        }
    }

    tokens[p..].iter().all(|tok| *tok == PatternToken::AnyRun)
}
