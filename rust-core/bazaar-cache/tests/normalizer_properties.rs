// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for key normalization and search patterns

mod common;

use bazaar_cache::{codes_key, search_key, search_patterns, KeySet, MarketCache, MarketConfig};
use bazaar_remote::predicate::ilike_matches;
use bazaar_remote::{InMemoryStore, MetricsStore};
use proptest::prelude::*;

/// Arbitrary id lists, including duplicates and non-positive noise.
fn arb_ids() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(-20i64..5000, 0..200)
}

/// Job-style codes, sometimes padded with whitespace.
fn arb_codes() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[ ]{0,2}[A-Z]{3}[ ]{0,2}", 0..12)
}

/// Search terms with at least one visible character, wildcards included.
fn arb_term() -> impl Strategy<Value = String> {
    "[a-z0-9%_\\\\ ]{0,6}[a-z0-9%_]{1,4}[a-z0-9 ]{0,6}"
}

proptest! {
    #[test]
    fn test_key_is_order_independent(
        ids in arb_ids().prop_flat_map(|ids| (Just(ids.clone()), Just(ids).prop_shuffle()))
    ) {
        let (original, shuffled) = ids;
        let original = KeySet::from_ids(original);
        let shuffled = KeySet::from_ids(shuffled);
        prop_assert_eq!(original.key(), shuffled.key());
    }

    #[test]
    fn test_key_lists_sorted_unique_positive_ids(ids in arb_ids()) {
        let set = KeySet::from_ids(ids.clone());
        let parsed: Vec<i64> = set
            .key()
            .as_str()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse().unwrap())
            .collect();

        prop_assert!(parsed.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(parsed.iter().all(|id| *id > 0));
        prop_assert_eq!(parsed.len(), set.len());
        for id in ids.iter().filter(|id| **id > 0) {
            prop_assert!(set.contains(*id));
        }
    }

    #[test]
    fn test_chunks_cover_ids_in_order(ids in arb_ids(), size in 1usize..64) {
        let set = KeySet::from_ids(ids);
        let mut rejoined = Vec::new();
        for chunk in set.chunks(size) {
            prop_assert!(!chunk.is_empty());
            prop_assert!(chunk.len() <= size);
            rejoined.extend_from_slice(chunk);
        }
        prop_assert_eq!(rejoined.as_slice(), set.ids());
    }

    #[test]
    fn test_codes_key_is_order_independent(
        codes in arb_codes().prop_flat_map(|c| (Just(c.clone()), Just(c).prop_shuffle()))
    ) {
        let (original, shuffled) = codes;
        prop_assert_eq!(
            codes_key(original.iter().map(String::as_str)),
            codes_key(shuffled.iter().map(String::as_str))
        );
    }

    #[test]
    fn test_search_key_ignores_surrounding_whitespace(
        term in arb_term(),
        pad in "[ ]{0,3}",
        fuzzy in any::<bool>()
    ) {
        let padded = format!("{pad}{term}{pad}");
        prop_assert_eq!(
            search_key(&term, fuzzy, Some(100)),
            search_key(&padded, fuzzy, Some(100))
        );
    }

    #[test]
    fn test_exact_pattern_matches_its_term(term in arb_term()) {
        let patterns = search_patterns(&term, false);
        prop_assert_eq!(patterns.len(), 1);
        prop_assert!(ilike_matches(&patterns[0], term.trim()));
        let padded = format!("xx{}yy", term.to_uppercase());
        prop_assert!(ilike_matches(&patterns[0], &padded));
    }

    #[test]
    fn test_fuzzy_patterns_match_their_term(term in arb_term()) {
        let patterns = search_patterns(&term, true);
        prop_assert_eq!(patterns.len(), term.split_whitespace().count());
        let text = term.to_uppercase();
        for pattern in &patterns {
            let matched = ilike_matches(pattern, &text);
            prop_assert!(matched, "{} should match {}", pattern, text);
        }
    }

    #[test]
    fn test_concurrent_permuted_lookups_share_one_query(
        ids in prop::collection::vec(1i64..300, 1..40)
            .prop_flat_map(|ids| (Just(ids.clone()), Just(ids).prop_shuffle()))
    ) {
        let (first, second) = ids;
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let remote = InMemoryStore::new();
            common::seed_many_items(&remote, 300).await;
            remote.set_latency(std::time::Duration::from_millis(5)).await;
            let cache = MarketCache::new(MetricsStore::new(remote), MarketConfig::default()).unwrap();

            let (a, b) = tokio::join!(cache.items(first, None), cache.items(second, None));
            prop_assert_eq!(a.unwrap(), b.unwrap());
            prop_assert_eq!(cache.remote().stats().await.query_count, 1);

            Ok(())
        })?;
    }
}
