// SPDX-License-Identifier: PMPL-1.0-or-later
//! Market cache configuration.
//!
//! Defaults:
//! - chunk_size: 1000 (the remote store's `in` predicate ceiling)
//! - search_limit: 100
//! - cache_enabled: true

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Largest `in` list the remote store accepts.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default row limit for free-text search.
pub const DEFAULT_SEARCH_LIMIT: usize = 100;

/// Names of the remote collections and columns the cache reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Collections {
    /// Identity column shared by every collection.
    pub id_column: String,
    /// Item master rows.
    pub items: String,
    /// Display name column on `items`.
    pub name_column: String,
    /// Category id column on `items`.
    pub category_column: String,
    /// Job-code array column on `items`.
    pub jobs_column: String,
    /// Item description rows.
    pub descriptions: String,
    /// Rows carrying the item level attribute.
    pub item_levels: String,
    pub level_column: String,
    /// Rows carrying the patch (game version) attribute.
    pub patches: String,
    pub patch_column: String,
    /// One row per marketable item id.
    pub marketable: String,
}

impl Default for Collections {
    fn default() -> Self {
        Self {
            id_column: "id".to_string(),
            items: "items".to_string(),
            name_column: "name".to_string(),
            category_column: "category_id".to_string(),
            jobs_column: "jobs".to_string(),
            descriptions: "item_descriptions".to_string(),
            item_levels: "equipment".to_string(),
            level_column: "level".to_string(),
            patches: "item_patches".to_string(),
            patch_column: "patch".to_string(),
            marketable: "marketable_items".to_string(),
        }
    }
}

impl Collections {
    fn names(&self) -> [(&'static str, &str); 11] {
        [
            ("id_column", self.id_column.as_str()),
            ("items", self.items.as_str()),
            ("name_column", self.name_column.as_str()),
            ("category_column", self.category_column.as_str()),
            ("jobs_column", self.jobs_column.as_str()),
            ("descriptions", self.descriptions.as_str()),
            ("item_levels", self.item_levels.as_str()),
            ("level_column", self.level_column.as_str()),
            ("patches", self.patches.as_str()),
            ("patch_column", self.patch_column.as_str()),
            ("marketable", self.marketable.as_str()),
        ]
    }
}

/// Configuration for a [`MarketCache`](crate::market::MarketCache).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Maximum keys per remote `in` query.
    pub chunk_size: usize,
    /// Maximum rows returned by one search.
    pub search_limit: usize,
    /// When false every operation goes straight to the remote store.
    pub cache_enabled: bool,
    pub collections: Collections,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            search_limit: DEFAULT_SEARCH_LIMIT,
            cache_enabled: true,
            collections: Collections::default(),
        }
    }
}

impl MarketConfig {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_search_limit(mut self, search_limit: usize) -> Self {
        self.search_limit = search_limit;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_collections(mut self, collections: Collections) -> Self {
        self.collections = collections;
        self
    }

    /// Reject settings the executor cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(CacheError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if self.search_limit == 0 {
            return Err(CacheError::InvalidConfig(
                "search_limit must be at least 1".to_string(),
            ));
        }
        if let Some((field, _)) = self
            .collections
            .names()
            .into_iter()
            .find(|(_, name)| name.trim().is_empty())
        {
            return Err(CacheError::InvalidConfig(format!(
                "collections.{field} must not be empty"
            )));
        }
        Ok(())
    }

    /// Defaults overlaid with `BAZAAR_CHUNK_SIZE`, `BAZAAR_SEARCH_LIMIT` and
    /// `BAZAAR_CACHE_ENABLED` from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for the
    /// `BAZAAR_*` variable names.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("BAZAAR_CHUNK_SIZE") {
            config.chunk_size = parse_usize("BAZAAR_CHUNK_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("BAZAAR_SEARCH_LIMIT") {
            config.search_limit = parse_usize("BAZAAR_SEARCH_LIMIT", &raw)?;
        }
        if let Some(raw) = lookup("BAZAAR_CACHE_ENABLED") {
            config.cache_enabled = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(CacheError::InvalidConfig(format!(
                        "BAZAAR_CACHE_ENABLED: expected a boolean, got '{other}'"
                    )))
                }
            };
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_usize(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|e| CacheError::InvalidConfig(format!("{name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MarketConfig::default();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.search_limit, 100);
        assert!(config.cache_enabled);
        assert_eq!(config.collections.items, "items");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars_overrides() {
        let config = MarketConfig::from_vars(vars(&[
            ("BAZAAR_CHUNK_SIZE", "250"),
            ("BAZAAR_SEARCH_LIMIT", " 20 "),
            ("BAZAAR_CACHE_ENABLED", "off"),
        ]))
        .unwrap();
        assert_eq!(config.chunk_size, 250);
        assert_eq!(config.search_limit, 20);
        assert!(!config.cache_enabled);
    }

    #[test]
    fn test_from_vars_empty_is_default() {
        let config = MarketConfig::from_vars(|_| None).unwrap();
        assert_eq!(config, MarketConfig::default());
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let err = MarketConfig::from_vars(vars(&[("BAZAAR_CHUNK_SIZE", "lots")])).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(msg) if msg.starts_with("BAZAAR_CHUNK_SIZE")));

        let err = MarketConfig::from_vars(vars(&[("BAZAAR_CACHE_ENABLED", "maybe")])).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));

        let err = MarketConfig::from_vars(vars(&[("BAZAAR_CHUNK_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, CacheError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_blank_collection() {
        let mut collections = Collections::default();
        collections.patches = "  ".to_string();
        let err = MarketConfig::default()
            .with_collections(collections)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::InvalidConfig("collections.patches must not be empty".to_string())
        );
    }

    #[test]
    fn test_serde_fills_missing_fields() {
        let config: MarketConfig = serde_json::from_str(r#"{"chunk_size": 10}"#).unwrap();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.search_limit, DEFAULT_SEARCH_LIMIT);
        assert_eq!(config.collections, Collections::default());
    }
}
