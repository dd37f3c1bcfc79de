// SPDX-License-Identifier: PMPL-1.0-or-later
//! Query kinds: the namespaces of the cache.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The broad shape of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryFamily {
    /// `id IN (...)` lookups against one collection.
    IdBatch,
    /// Free-text `ilike` search.
    Search,
    /// Value-to-owning-ids lookups (categories, jobs).
    Reverse,
    /// Multi-collection joins producing ordered records.
    Joined,
}

/// A concrete query kind. Each kind owns a separate cache namespace, so equal
/// normalized keys under different kinds never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    Items,
    Descriptions,
    ItemLevels,
    Patches,
    Marketable,
    Search,
    ItemsByCategory,
    ItemsByJob,
    ListingByIds,
    ListingBySearch,
}

impl QueryKind {
    /// Every kind, in declaration order.
    pub const ALL: [QueryKind; 10] = [
        QueryKind::Items,
        QueryKind::Descriptions,
        QueryKind::ItemLevels,
        QueryKind::Patches,
        QueryKind::Marketable,
        QueryKind::Search,
        QueryKind::ItemsByCategory,
        QueryKind::ItemsByJob,
        QueryKind::ListingByIds,
        QueryKind::ListingBySearch,
    ];

    pub fn family(self) -> QueryFamily {
        match self {
            QueryKind::Items
            | QueryKind::Descriptions
            | QueryKind::ItemLevels
            | QueryKind::Patches
            | QueryKind::Marketable => QueryFamily::IdBatch,
            QueryKind::Search => QueryFamily::Search,
            QueryKind::ItemsByCategory | QueryKind::ItemsByJob => QueryFamily::Reverse,
            QueryKind::ListingByIds | QueryKind::ListingBySearch => QueryFamily::Joined,
        }
    }

    /// Whether results of this kind are also folded into a per-kind
    /// "everything seen so far" accumulator.
    pub fn accumulates(self) -> bool {
        matches!(self, QueryKind::Descriptions)
    }

    /// Stable name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Items => "items",
            QueryKind::Descriptions => "descriptions",
            QueryKind::ItemLevels => "item_levels",
            QueryKind::Patches => "patches",
            QueryKind::Marketable => "marketable",
            QueryKind::Search => "search",
            QueryKind::ItemsByCategory => "items_by_category",
            QueryKind::ItemsByJob => "items_by_job",
            QueryKind::ListingByIds => "listing_by_ids",
            QueryKind::ListingBySearch => "listing_by_search",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
