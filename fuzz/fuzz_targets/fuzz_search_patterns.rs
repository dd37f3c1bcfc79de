// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for search keys, ilike patterns and id-list parsing

#![no_main]

use bazaar_cache::{search_key, search_patterns, KeySet};
use bazaar_remote::predicate::ilike_matches;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(term) = std::str::from_utf8(data) else {
        return;
    };

    // A term always matches the patterns built from it.
    for fuzzy in [false, true] {
        let key = search_key(term, fuzzy, Some(100));
        let patterns = search_patterns(term, fuzzy);
        assert_eq!(key.is_empty(), patterns.is_empty());
        for pattern in &patterns {
            assert!(ilike_matches(pattern, term));
        }
    }

    // Comma-separated ids never panic and never keep non-positive values.
    let set = KeySet::from_strs(term.split(','));
    assert!(set.ids().iter().all(|id| *id > 0));
});
